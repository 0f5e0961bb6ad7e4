//! Path containment checks.
//!
//! # Responsibilities
//! - Resolve a root and a candidate path to canonical absolute form
//! - Accept the candidate only if it lies inside the root
//!
//! # Design Decisions
//! - Containment is component-wise (`Path::starts_with`), never a string prefix
//! - Symlinks are followed, so a link pointing outside the root is rejected
//! - Candidates that do not exist yet are resolved through their deepest
//!   existing ancestor; `..` in the missing remainder is rejected outright

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::DispatchError;

/// Ensure `candidate` resolves to a location inside `root`.
///
/// Returns the resolved candidate path on success.
pub fn ensure_contained(root: &Path, candidate: &Path) -> Result<PathBuf, DispatchError> {
    let root = root.canonicalize().map_err(|e| {
        DispatchError::Forbidden(format!("cannot resolve root {}: {}", root.display(), e))
    })?;
    let resolved = resolve(candidate)?;

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        tracing::warn!(
            root = %root.display(),
            candidate = %candidate.display(),
            "Path escapes sandbox"
        );
        Err(DispatchError::Forbidden("path escapes project root".to_string()))
    }
}

fn resolve(candidate: &Path) -> Result<PathBuf, DispatchError> {
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DispatchError::Forbidden(format!("cannot resolve path: {}", e)))?
            .join(candidate)
    };

    let mut existing = absolute.as_path();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut base) => {
                for part in missing.iter().rev() {
                    base.push(part);
                }
                return Ok(base);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match existing.components().next_back() {
                    Some(Component::Normal(name)) => missing.push(name.to_os_string()),
                    Some(Component::CurDir) => {}
                    _ => {
                        return Err(DispatchError::Forbidden(format!(
                            "unresolvable path: {}",
                            candidate.display()
                        )))
                    }
                }
                existing = existing.parent().ok_or_else(|| {
                    DispatchError::Forbidden(format!("unresolvable path: {}", candidate.display()))
                })?;
            }
            Err(e) => {
                return Err(DispatchError::Forbidden(format!(
                    "cannot resolve {}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }
}
