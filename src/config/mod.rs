//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via ArcSwap to request handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<ServerConfig>
//!     → next request observes new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener, middleware and engine limits are read once at startup;
//!   workspace, static files and CORS settings follow reloads

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    CorsConfig, HandlerConfig, ListenerConfig, ObservabilityConfig, SecurityConfig,
    ServerConfig, StaticFilesConfig, TimeoutConfig, WorkspaceConfig,
};
pub use watcher::{ConfigOverrides, ConfigWatcher};
