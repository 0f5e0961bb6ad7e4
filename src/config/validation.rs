//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check addresses parse and names are usable as path segments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.workspace.dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("workspace.dir", "must not be empty"));
    }

    let subdir = &config.workspace.handlers_subdir;
    if subdir.is_empty() || subdir.contains(['/', '\\']) || subdir.starts_with('.') {
        errors.push(ValidationError::new(
            "workspace.handlers_subdir",
            format!("'{}' must be a plain directory name", subdir),
        ));
    }

    if config.handlers.max_call_levels == 0 {
        errors.push(ValidationError::new("handlers.max_call_levels", "must be greater than 0"));
    }

    let index = &config.static_files.index_file;
    if index.is_empty() || index.contains(['/', '\\']) {
        errors.push(ValidationError::new(
            "static_files.index_file",
            format!("'{}' must be a plain file name", index),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.cors.enabled && config.cors.allow_origin.is_empty() {
        errors.push(ValidationError::new("cors.allow_origin", "must not be empty when CORS is enabled"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
