//! Static file serving from project roots.
//!
//! # Responsibilities
//! - Serve files under a project root with content type inferred from extension
//! - Serve the index file for directories, otherwise a generated listing
//! - Resolve every path through the path guard
//!
//! # Design Decisions
//! - File bodies are streamed by `tower_http::services::ServeFile`
//! - Hidden (dot-prefixed) entries never appear in listings

use std::fs;
use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    response::{Html, IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::DispatchError;
use crate::http::server::AppState;
use crate::workspace::{ensure_contained, ProjectName};

/// `GET /{project}` and `GET /{project}/`
pub async fn project_index(
    State(state): State<AppState>,
    Path(project): Path<String>,
    request: Request<Body>,
) -> Result<Response, DispatchError> {
    serve(&state, &project, "", request).await
}

/// `GET /{project}/{*path}`
pub async fn project_path(
    State(state): State<AppState>,
    Path((project, path)): Path<(String, String)>,
    request: Request<Body>,
) -> Result<Response, DispatchError> {
    serve(&state, &project, &path, request).await
}

async fn serve(
    state: &AppState,
    project: &str,
    relative: &str,
    request: Request<Body>,
) -> Result<Response, DispatchError> {
    let config = state.config.load_full();
    let project = ProjectName::parse(project)?;
    if !config.static_files.enabled {
        return Err(DispatchError::FileNotFound(format!("/{}/{}", project, relative)));
    }

    let root = state.workspace().resolve_project_root(&project)?;
    let relative = relative.trim_matches('/');
    let target = ensure_contained(&root, &root.join(relative))?;

    if target.is_dir() {
        let index = target.join(&config.static_files.index_file);
        if index.is_file() {
            return serve_file(&index, request).await;
        }
        if !config.static_files.directory_listing {
            return Err(DispatchError::FileNotFound(format!("/{}/{}", project, relative)));
        }
        let html = render_listing(project.as_str(), relative, &target)?;
        return Ok(Html(html).into_response());
    }

    if !target.is_file() {
        return Err(DispatchError::FileNotFound(format!("/{}/{}", project, relative)));
    }
    serve_file(&target, request).await
}

async fn serve_file(path: &FsPath, request: Request<Body>) -> Result<Response, DispatchError> {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(never) => match never {},
    }
}

/// Render an HTML listing of `dir`, linking entries under `/{project}/{relative}`.
pub fn render_listing(project: &str, relative: &str, dir: &FsPath) -> Result<String, DispatchError> {
    let entries = fs::read_dir(dir)
        .map_err(|_| DispatchError::FileNotFound(format!("/{}/{}", project, relative)))?;

    let mut names: Vec<(String, bool)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let is_dir = e.path().is_dir();
            e.file_name().into_string().ok().map(|name| (name, is_dir))
        })
        .filter(|(name, _)| !name.starts_with('.'))
        .collect();
    names.sort();

    let base = if relative.is_empty() {
        format!("/{}", project)
    } else {
        format!("/{}/{}", project, relative)
    };

    let mut html = vec![format!("<h3>{}</h3>", escape(&base)), "<ul>".to_string()];
    for (name, is_dir) in names {
        let suffix = if is_dir { "/" } else { "" };
        html.push(format!(
            "<li><a href=\"{}/{}{}\">{}{}</a></li>",
            escape(&base),
            escape(&name),
            suffix,
            escape(&name),
            suffix
        ));
    }
    html.push("</ul>".to_string());
    Ok(html.join("\n"))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_marks_directories_and_hides_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("app.js"), "").unwrap();
        fs::write(dir.path().join(".env"), "").unwrap();

        let html = render_listing("demo", "", dir.path()).unwrap();
        assert!(html.starts_with("<h3>/demo</h3>"));
        assert!(html.contains(r#"<a href="/demo/assets/">assets/</a>"#));
        assert!(html.contains(r#"<a href="/demo/app.js">app.js</a>"#));
        assert!(!html.contains(".env"));
    }

    #[test]
    fn test_listing_escapes_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a&b.txt"), "").unwrap();

        let html = render_listing("demo", "docs", dir.path()).unwrap();
        assert!(html.contains(r#"<a href="/demo/docs/a&amp;b.txt">a&amp;b.txt</a>"#));
    }
}
