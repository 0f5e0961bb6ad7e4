//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::config::loader::{apply_env_overrides, read_config, ConfigError};
use crate::config::validation::validate_config;
use crate::config::schema::ServerConfig;

/// Adjustments re-applied to every reloaded config (e.g. CLI flags).
pub type ConfigOverrides = Arc<dyn Fn(&mut ServerConfig) + Send + Sync>;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
    overrides: Option<ConfigOverrides>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
            overrides: None,
        }, update_rx)
    }

    /// Re-apply `overrides` after each reload, on top of file and environment.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let overrides = self.overrides.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Config file change detected, reloading");
                        match reload(&path, overrides.as_ref()) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, overrides: Option<&ConfigOverrides>) -> Result<ServerConfig, ConfigError> {
    let mut config = read_config(path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    if let Some(overrides) = overrides {
        overrides(&mut config);
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
