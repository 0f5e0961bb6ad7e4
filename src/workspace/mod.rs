//! Workspace subsystem.
//!
//! # Data Flow
//! ```text
//! raw project / handler strings
//!     → name.rs (grammar check, no fs access)
//!     → resolver.rs (join onto workspace base, existence check)
//!     → guard.rs (canonical containment check before file access)
//! ```
//!
//! # Design Decisions
//! - Every path derived from a request passes through all three stages
//! - A project exists iff its directory exists; nothing registers projects

pub mod guard;
pub mod name;
pub mod resolver;

pub use guard::ensure_contained;
pub use name::{HandlerName, ProjectName};
pub use resolver::{Workspace, HANDLER_EXTENSION};
