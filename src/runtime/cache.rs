//! Module cache with mtime-based hot reload.
//!
//! # Responsibilities
//! - Map (project, handler) to the currently loaded handler unit
//! - Reload a unit when its source file's modification time changes
//! - Serialize check/reload/install per key
//!
//! # Design Decisions
//! - Populate on demand, never evict: every key observed stays resident
//!   until the process exits
//! - A reload installs a new `Arc<HandlerUnit>`; requests already holding the
//!   previous unit keep using it
//! - The dashmap entry lock is held across stat/compile/install, so two
//!   requests never compile the same key concurrently
//! - Rewrites within one mtime tick of the filesystem are not detected
//! - Failed loads are not cached; the next request tries again

use std::fs;
use std::io;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rhai::Engine;

use crate::error::DispatchError;
use crate::observability::metrics;
use crate::runtime::unit::HandlerUnit;
use crate::workspace::{ensure_contained, HandlerName, ProjectName, Workspace};

/// Cache key: one entry per project/handler pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub project: ProjectName,
    pub handler: HandlerName,
}

/// Outcome of a cache lookup, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Hit,
    Loaded,
    Reloaded,
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadOutcome::Hit => "hit",
            LoadOutcome::Loaded => "load",
            LoadOutcome::Reloaded => "reload",
        }
    }
}

/// Process-wide store of loaded handler units.
pub struct ModuleCache {
    engine: Arc<Engine>,
    entries: DashMap<HandlerKey, Arc<HandlerUnit>>,
}

impl ModuleCache {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            entries: DashMap::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of resident units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Currently installed unit for a key, without touching the filesystem.
    pub fn peek(&self, project: &ProjectName, handler: &HandlerName) -> Option<Arc<HandlerUnit>> {
        let key = HandlerKey {
            project: project.clone(),
            handler: handler.clone(),
        };
        self.entries.get(&key).map(|unit| Arc::clone(unit.value()))
    }

    /// Return the current unit for a handler, loading or reloading it if the
    /// source changed since the last load.
    pub fn get_handler(
        &self,
        workspace: &Workspace,
        project: &ProjectName,
        handler: &HandlerName,
    ) -> Result<Arc<HandlerUnit>, DispatchError> {
        let not_found = || DispatchError::HandlerNotFound {
            project: project.to_string(),
            handler: handler.to_string(),
        };

        let root = workspace.resolve_project_root(project)?;
        let handlers_dir = workspace.handlers_dir(&root);
        if !handlers_dir.is_dir() {
            return Err(not_found());
        }
        let path = ensure_contained(&handlers_dir, &workspace.handler_path(&root, handler))?;
        if !path.is_file() {
            return Err(not_found());
        }

        let key = HandlerKey {
            project: project.clone(),
            handler: handler.clone(),
        };

        let result = {
            let entry = self.entries.entry(key);

            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
                Err(e) => {
                    return Err(DispatchError::HandlerMisconfigured(format!(
                        "{}/api/{}: cannot read modification time: {}",
                        project, handler, e
                    )))
                }
            };

            match entry {
                Entry::Occupied(occupied)
                    if occupied.get().modified() == modified && occupied.get().path() == path.as_path() =>
                {
                    Ok((Arc::clone(occupied.get()), LoadOutcome::Hit, None))
                }
                Entry::Occupied(mut occupied) => {
                    let replaced_age = occupied.get().loaded_at().elapsed();
                    HandlerUnit::load(&self.engine, project, handler, &path, modified).map(|unit| {
                        let unit = Arc::new(unit);
                        occupied.insert(Arc::clone(&unit));
                        (unit, LoadOutcome::Reloaded, Some(replaced_age))
                    })
                }
                Entry::Vacant(vacant) => {
                    HandlerUnit::load(&self.engine, project, handler, &path, modified).map(|unit| {
                        let unit = Arc::new(unit);
                        vacant.insert(Arc::clone(&unit));
                        (unit, LoadOutcome::Loaded, None)
                    })
                }
            }
        };

        match result {
            Ok((unit, outcome, replaced_age)) => {
                metrics::record_handler_load(outcome.as_str());
                if outcome != LoadOutcome::Hit {
                    metrics::record_cache_entries(self.entries.len());
                    tracing::info!(
                        project = %project,
                        handler = %handler,
                        outcome = outcome.as_str(),
                        path = %path.display(),
                        replaced_after_ms = replaced_age.map(|age| age.as_millis() as u64),
                        "Handler loaded"
                    );
                }
                Ok(unit)
            }
            Err(e) => {
                metrics::record_handler_load("error");
                tracing::warn!(project = %project, handler = %handler, error = %e, "Handler load failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlerConfig;
    use crate::runtime::engine::build_engine;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn setup() -> (tempfile::TempDir, Workspace, ModuleCache) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("demo/handlers")).unwrap();
        let ws = Workspace::new(dir.path(), "handlers");
        let cache = ModuleCache::new(Arc::new(build_engine(&HandlerConfig::default())));
        (dir, ws, cache)
    }

    fn write_with_mtime(path: &Path, source: &str, mtime: SystemTime) {
        fs::write(path, source).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    fn names(project: &str, handler: &str) -> (ProjectName, HandlerName) {
        (ProjectName::parse(project).unwrap(), HandlerName::parse(handler).unwrap())
    }

    #[test]
    fn test_unchanged_file_is_served_from_cache() {
        let (dir, ws, cache) = setup();
        fs::write(dir.path().join("demo/handlers/ping.rhai"), "fn get() { 1 }").unwrap();
        let (p, h) = names("demo", "ping");

        let first = cache.get_handler(&ws, &p, &h).unwrap();
        let second = cache.get_handler(&ws, &p, &h).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_changed_mtime_triggers_reload() {
        let (dir, ws, cache) = setup();
        let path = dir.path().join("demo/handlers/ping.rhai");
        let t0 = SystemTime::now() - Duration::from_secs(60);
        write_with_mtime(&path, "fn get() { 1 }", t0);
        let (p, h) = names("demo", "ping");

        let first = cache.get_handler(&ws, &p, &h).unwrap();
        write_with_mtime(&path, "fn get() { 2 }", t0 + Duration::from_secs(5));
        let second = cache.get_handler(&ws, &p, &h).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(second.loaded_at() >= first.loaded_at());

        let entry = second.select("GET").unwrap();
        let value = second
            .invoke(cache.engine(), &entry, &Default::default())
            .unwrap();
        assert_eq!(value.as_int().unwrap(), 2);

        // the superseded unit still works for whoever holds it
        let old_entry = first.select("GET").unwrap();
        let old = first.invoke(cache.engine(), &old_entry, &Default::default()).unwrap();
        assert_eq!(old.as_int().unwrap(), 1);
    }

    #[test]
    fn test_missing_handler_and_project() {
        let (_dir, ws, cache) = setup();
        let (p, h) = names("demo", "ghost");
        assert!(matches!(
            cache.get_handler(&ws, &p, &h),
            Err(DispatchError::HandlerNotFound { .. })
        ));

        let (p, h) = names("nope", "ghost");
        assert!(matches!(
            cache.get_handler(&ws, &p, &h),
            Err(DispatchError::ProjectNotFound(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let (dir, ws, cache) = setup();
        let path = dir.path().join("demo/handlers/broken.rhai");
        let t0 = SystemTime::now() - Duration::from_secs(60);
        write_with_mtime(&path, "fn get( {", t0);
        let (p, h) = names("demo", "broken");

        assert!(matches!(
            cache.get_handler(&ws, &p, &h),
            Err(DispatchError::HandlerMisconfigured(_))
        ));
        assert!(cache.peek(&p, &h).is_none());

        write_with_mtime(&path, "fn get() { 1 }", t0 + Duration::from_secs(1));
        assert!(cache.get_handler(&ws, &p, &h).is_ok());
        assert!(cache.peek(&p, &h).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_handler_outside_project_is_forbidden() {
        let (dir, ws, cache) = setup();
        fs::write(dir.path().join("evil.rhai"), "fn get() { 1 }").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("evil.rhai"),
            dir.path().join("demo/handlers/evil.rhai"),
        )
        .unwrap();
        let (p, h) = names("demo", "evil");

        assert!(matches!(
            cache.get_handler(&ws, &p, &h),
            Err(DispatchError::Forbidden(_))
        ));
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let (dir, ws, cache) = setup();
        fs::write(dir.path().join("demo/handlers/ping.rhai"), "fn get() { 1 }").unwrap();
        let cache = Arc::new(cache);
        let ws = Arc::new(ws);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let ws = Arc::clone(&ws);
                std::thread::spawn(move || {
                    let (p, h) = names("demo", "ping");
                    cache.get_handler(&ws, &p, &h).unwrap()
                })
            })
            .collect();

        let units: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(units.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
