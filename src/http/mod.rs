//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, header flattening)
//!     → api.rs (dispatch to handler runtime, handler listing)
//!       or static_files.rs (project files, directory listings)
//!     → response.rs (render handler reply)
//!     → middleware/cors.rs (CORS headers)
//!     → Send to client
//! ```

pub mod api;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
