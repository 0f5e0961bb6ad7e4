//! Dispatch error taxonomy.
//!
//! Every failure on the request path ends up as one of these variants and is
//! rendered as a JSON body `{ "error": <message> }` with the matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors surfaced by the workspace resolver, path guard, module cache and
/// dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The project directory does not exist under the workspace.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// No handler source file for the requested name.
    #[error("handler not found: {project}/api/{handler}")]
    HandlerNotFound { project: String, handler: String },

    /// A caller-supplied name or path failed validation or escapes its root.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The handler exists but does not accept this verb.
    #[error("method {method} not allowed for {project}/api/{handler}")]
    MethodNotAllowed {
        project: String,
        handler: String,
        method: String,
    },

    /// The handler source violates the handler contract (or fails to load).
    #[error("{0}")]
    HandlerMisconfigured(String),

    /// The handler raised an error while being invoked.
    #[error("handler error: {0}")]
    HandlerRuntimeError(String),

    /// A static file or directory does not exist (or is not served).
    #[error("file not found: {0}")]
    FileNotFound(String),
}

impl DispatchError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::ProjectNotFound(_)
            | DispatchError::HandlerNotFound { .. }
            | DispatchError::FileNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::HandlerMisconfigured(_) | DispatchError::HandlerRuntimeError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::ProjectNotFound(_) => "project_not_found",
            DispatchError::HandlerNotFound { .. } => "handler_not_found",
            DispatchError::Forbidden(_) => "forbidden",
            DispatchError::MethodNotAllowed { .. } => "method_not_allowed",
            DispatchError::HandlerMisconfigured(_) => "handler_misconfigured",
            DispatchError::HandlerRuntimeError(_) => "handler_runtime_error",
            DispatchError::FileNotFound(_) => "file_not_found",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Dispatch failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
