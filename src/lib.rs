//! Multi-tenant, hot-reloading request dispatcher.
//!
//! One server process hosts any number of projects under a workspace
//! directory. Each project owns a `handlers/` directory of Rhai scripts and
//! static assets; handlers become live as soon as they are written to disk.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod runtime;
pub mod workspace;

pub use config::schema::ServerConfig;
pub use error::DispatchError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use runtime::Dispatcher;
