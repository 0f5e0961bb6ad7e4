//! Request-to-handler dispatch.
//!
//! # Responsibilities
//! - Validate project and handler names before any filesystem access
//! - Answer pre-flight (`OPTIONS`) requests without touching handler code
//! - Obtain the current unit from the module cache
//! - Select the entry point by convention, invoke it once, normalize the result
//!
//! # Design Decisions
//! - Dispatch is synchronous; the HTTP layer runs it on a blocking thread
//! - Handler failures become `HandlerRuntimeError` at this boundary and are
//!   never retried

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::Method;

use crate::error::DispatchError;
use crate::runtime::cache::ModuleCache;
use crate::runtime::reply::HandlerReply;
use crate::runtime::unit::RequestContext;
use crate::workspace::{HandlerName, ProjectName, Workspace};

/// An inbound API request, detached from the HTTP framework.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub project: String,
    pub handler: String,
    pub method: Method,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Bytes,
}

/// Routes API requests to hot-reloaded handler units.
pub struct Dispatcher {
    cache: Arc<ModuleCache>,
}

impl Dispatcher {
    pub fn new(cache: Arc<ModuleCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Dispatch one request against the given workspace.
    pub fn dispatch(
        &self,
        workspace: &Workspace,
        request: DispatchRequest,
    ) -> Result<HandlerReply, DispatchError> {
        let project = ProjectName::parse(&request.project)?;
        let handler = HandlerName::parse(&request.handler)?;

        if request.method == Method::OPTIONS {
            tracing::debug!(project = %project, handler = %handler, "Pre-flight request answered");
            return Ok(HandlerReply::no_content());
        }

        let unit = self.cache.get_handler(workspace, &project, &handler)?;
        let entry = unit.select(request.method.as_str())?;

        tracing::debug!(
            project = %project,
            handler = %handler,
            method = %request.method,
            function = %entry.function,
            "Invoking handler"
        );

        let context = build_context(request, &project, &handler);
        let value = unit.invoke(self.cache.engine(), &entry, &context)?;

        HandlerReply::from_dynamic(value).map_err(DispatchError::HandlerRuntimeError)
    }
}

fn build_context(request: DispatchRequest, project: &ProjectName, handler: &HandlerName) -> RequestContext {
    let json = if request.body.is_empty() {
        None
    } else {
        serde_json::from_slice(&request.body).ok()
    };

    RequestContext {
        method: request.method.to_string(),
        path: request.path,
        project: project.to_string(),
        handler: handler.to_string(),
        headers: request.headers,
        query: request.query,
        body: String::from_utf8_lossy(&request.body).into_owned(),
        json,
    }
}
