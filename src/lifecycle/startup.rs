//! Startup orchestration.
//!
//! # Responsibilities
//! - Make sure the workspace directory exists
//! - Build the shared engine, module cache and dispatcher in dependency order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The module cache is created here and owned by the dispatcher for the
//!   life of the process

use std::io;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::runtime::{build_engine, Dispatcher, ModuleCache};

/// Create the workspace directory if it is missing.
pub fn prepare_workspace(config: &ServerConfig) -> io::Result<()> {
    let dir = &config.workspace.dir;
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        tracing::info!(workspace = %dir.display(), "Created workspace directory");
    }
    Ok(())
}

/// Build the dispatcher with an empty module cache.
pub fn build_dispatcher(config: &ServerConfig) -> Dispatcher {
    let engine = Arc::new(build_engine(&config.handlers));
    Dispatcher::new(Arc::new(ModuleCache::new(engine)))
}
