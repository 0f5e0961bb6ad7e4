//! Workspace resolver.
//!
//! Maps validated project names to directories under the workspace base.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DispatchError;
use crate::workspace::name::{HandlerName, ProjectName};

/// Source file extension of handler modules.
pub const HANDLER_EXTENSION: &str = "rhai";

/// A view of the workspace directory that hosts all projects.
#[derive(Debug, Clone)]
pub struct Workspace {
    base: PathBuf,
    handlers_subdir: String,
}

impl Workspace {
    pub fn new(base: impl Into<PathBuf>, handlers_subdir: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            handlers_subdir: handlers_subdir.into(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve the root directory of a project.
    ///
    /// Pure join plus existence check; the name has already been validated.
    pub fn resolve_project_root(&self, project: &ProjectName) -> Result<PathBuf, DispatchError> {
        let root = self.base.join(project.as_str());
        if root.is_dir() {
            Ok(root)
        } else {
            Err(DispatchError::ProjectNotFound(project.to_string()))
        }
    }

    /// Directory holding the handler sources of a project root.
    pub fn handlers_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.handlers_subdir)
    }

    /// Expected source path of a handler (may not exist).
    pub fn handler_path(&self, project_root: &Path, handler: &HandlerName) -> PathBuf {
        self.handlers_dir(project_root)
            .join(format!("{}.{}", handler.as_str(), HANDLER_EXTENSION))
    }

    /// Visible project directories, sorted.
    pub fn list_projects(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.base) else {
            return Vec::new();
        };
        let mut projects: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        projects.sort();
        projects
    }

    /// Discoverable handler names of a project, sorted.
    ///
    /// Hidden and underscore-prefixed files are excluded.
    pub fn list_handlers(&self, project: &ProjectName) -> Result<Vec<String>, DispatchError> {
        let root = self.resolve_project_root(project)?;
        let dir = self.handlers_dir(&root);
        let entries = fs::read_dir(&dir).map_err(|_| {
            DispatchError::ProjectNotFound(format!(
                "{} (no {}/ directory)",
                project, self.handlers_subdir
            ))
        })?;

        let mut handlers: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| !name.starts_with('_') && !name.starts_with('.'))
            .filter_map(|name| {
                name.strip_suffix(&format!(".{}", HANDLER_EXTENSION))
                    .map(str::to_string)
            })
            .collect();
        handlers.sort();
        Ok(handlers)
    }
}
