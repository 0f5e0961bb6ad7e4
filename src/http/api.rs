//! API endpoints: handler dispatch, handler listing, workspace info.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::DispatchError;
use crate::http::request::{flatten_headers, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::runtime::DispatchRequest;
use crate::workspace::{ProjectName, Workspace};

#[derive(Serialize)]
pub struct HandlerListing {
    pub project: String,
    pub modules: Vec<String>,
}

#[derive(Serialize)]
pub struct WorkspaceInfo {
    pub workspace: String,
    pub projects: Vec<String>,
    pub static_hint: &'static str,
    pub api_hint: &'static str,
}

/// `{method} /{project}/api/{handler}`
pub async fn dispatch_api(
    State(state): State<AppState>,
    Path((project, handler)): Path<(String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers).to_string();

    tracing::debug!(
        request_id = %request_id,
        project = %project,
        handler = %handler,
        method = %method,
        "Dispatching request"
    );

    let request = DispatchRequest {
        project: project.clone(),
        handler,
        method: method.clone(),
        path: uri.path().to_string(),
        headers: flatten_headers(&headers),
        query,
        body,
    };

    let workspace = state.workspace();
    let dispatcher = Arc::clone(&state.dispatcher);
    let outcome = tokio::task::spawn_blocking(move || {
        let result = dispatcher.dispatch(&workspace, request);
        (result, project_label(&workspace, &project))
    })
    .await;

    let (response, label) = match outcome {
        Ok((Ok(reply), label)) => (reply.into_response(), label),
        Ok((Err(e), label)) => (e.into_response(), label),
        Err(join_error) => {
            tracing::error!(request_id = %request_id, error = %join_error, "Handler worker failed");
            let error = DispatchError::HandlerRuntimeError(format!("handler aborted: {}", join_error));
            (error.into_response(), metrics::UNKNOWN_PROJECT.to_string())
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &label, start);
    response
}

/// Metrics label for `project`: its name when it is a project of the
/// workspace, otherwise a fixed placeholder.
fn project_label(workspace: &Workspace, project: &str) -> String {
    ProjectName::parse(project)
        .ok()
        .filter(|name| workspace.resolve_project_root(name).is_ok())
        .map_or_else(|| metrics::UNKNOWN_PROJECT.to_string(), |name| name.to_string())
}

/// `GET /{project}/api/`
pub async fn list_handlers(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Result<Json<HandlerListing>, DispatchError> {
    let project = ProjectName::parse(&project)?;
    let modules = state.workspace().list_handlers(&project)?;

    Ok(Json(HandlerListing {
        project: project.to_string(),
        modules,
    }))
}

/// `GET /`
pub async fn workspace_info(State(state): State<AppState>) -> Json<WorkspaceInfo> {
    let workspace = state.workspace();
    Json(WorkspaceInfo {
        workspace: workspace.base().display().to_string(),
        projects: workspace.list_projects(),
        static_hint: "/<project>/... (serves files from workspace/<project>)",
        api_hint: "/<project>/api/<handler> (runs workspace/<project>/handlers/<handler>.rhai)",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_label_only_names_existing_projects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("demo/handlers")).unwrap();
        let workspace = Workspace::new(dir.path(), "handlers");

        assert_eq!(project_label(&workspace, "demo"), "demo");
        assert_eq!(project_label(&workspace, "3f2c9a1e-ghost"), metrics::UNKNOWN_PROJECT);
        assert_eq!(project_label(&workspace, "..secret"), metrics::UNKNOWN_PROJECT);
        assert_eq!(project_label(&workspace, "a;b"), metrics::UNKNOWN_PROJECT);
    }
}
