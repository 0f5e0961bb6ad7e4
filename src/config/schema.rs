//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the workspace server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Workspace location and layout.
    pub workspace: WorkspaceConfig,

    /// Handler engine limits.
    pub handlers: HandlerConfig,

    /// Static file serving.
    pub static_files: StaticFilesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub security: SecurityConfig,

    /// CORS response headers.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4000".to_string(),
        }
    }
}

/// Workspace configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per project.
    pub dir: PathBuf,

    /// Name of the handler subdirectory inside each project.
    pub handlers_subdir: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("workspace"),
            handlers_subdir: "handlers".to_string(),
        }
    }
}

/// Limits applied to the handler script engine (startup only).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HandlerConfig {
    /// Maximum script operations per evaluation (0 = unlimited).
    pub max_operations: u64,

    /// Maximum function call depth.
    pub max_call_levels: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_operations: 0,
            max_call_levels: 64,
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Serve files from project roots.
    pub enabled: bool,

    /// Generate listings for directories without an index file.
    pub directory_listing: bool,

    /// File served for directory requests when present.
    pub index_file: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory_listing: true,
            index_file: "index.html".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// An expired request is answered with 408; the handler is not interrupted.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Add CORS headers to every response.
    pub enabled: bool,

    /// Value of `Access-Control-Allow-Origin`.
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origin: "*".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
