//! Handler runtime subsystem.
//!
//! # Data Flow
//! ```text
//! DispatchRequest (project, handler, verb, body, query)
//!     → dispatcher.rs (name checks, OPTIONS short-circuit)
//!     → cache.rs (mtime check, reload on change)
//!     → unit.rs (entry-point selection, invocation)
//!     → reply.rs (normalize return value)
//!     → HandlerReply
//! ```
//!
//! # Design Decisions
//! - Handlers are Rhai scripts compiled by one shared engine (engine.rs)
//! - The cache is owned by the dispatcher and handed to it at startup

pub mod cache;
pub mod dispatcher;
pub mod engine;
pub mod reply;
pub mod unit;

pub use cache::ModuleCache;
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use engine::build_engine;
pub use reply::{HandlerReply, ReplyBody};
pub use unit::{HandlerShape, HandlerUnit, RequestContext};
