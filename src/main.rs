//! Workspace server
//!
//! A multi-tenant request dispatcher built with Tokio and Axum. Handler
//! scripts are picked up from disk on the next request after they change.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                  WORKSPACE SERVER                    │
//!                              │                                                      │
//!     Client Request           │  ┌─────────┐    ┌───────────┐    ┌──────────────┐    │
//!     ─────────────────────────┼─▶│  http   │───▶│ dispatcher│───▶│ module cache │    │
//!                              │  │ server  │    │ (OPTIONS, │    │ (mtime check │    │
//!                              │  └────┬────┘    │  names)   │    │  + reload)   │    │
//!                              │       │         └─────┬─────┘    └──────┬───────┘    │
//!                              │       ▼               │                 ▼            │
//!                              │  ┌─────────┐          │         ┌──────────────┐     │
//!                              │  │ static  │          │         │  path guard  │     │
//!                              │  │ files   │          │         │  + resolver  │     │
//!                              │  └─────────┘          ▼         └──────┬───────┘     │
//!     Client Response          │                ┌────────────┐          ▼            │
//!     ◀────────────────────────┼────────────────│ rhai unit  │◀──── workspace/      │
//!                              │                │ (invoke)   │      <project>/      │
//!                              │                └────────────┘      handlers/*.rhai │
//!                              │                                                      │
//!                              │  config (+watcher) · observability · lifecycle       │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use workspace_server::config::loader::{read_config, ConfigError};
use workspace_server::config::validation::validate_config;
use workspace_server::config::{apply_env_overrides, ConfigOverrides, ConfigWatcher, ServerConfig};
use workspace_server::lifecycle::{signals, startup, Shutdown};
use workspace_server::observability::{logging, metrics};
use workspace_server::HttpServer;

#[derive(Parser)]
#[command(name = "workspace-server")]
#[command(about = "Serve workspace projects with hot-reloaded handlers", long_about = None)]
struct Args {
    /// TOML configuration file (watched for changes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace directory (overrides config and WORKSPACE_DIR).
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Bind address (overrides config and PORT).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ServerConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    let cli_overrides: ConfigOverrides = {
        let workspace = args.workspace.clone();
        let bind = args.bind.clone();
        Arc::new(move |config: &mut ServerConfig| {
            if let Some(workspace) = &workspace {
                config.workspace.dir = workspace.clone();
            }
            if let Some(bind) = &bind {
                config.listener.bind_address = bind.clone();
            }
        })
    };
    cli_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level);

    tracing::info!("workspace-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        workspace = %config.workspace.dir.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    startup::prepare_workspace(&config)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.with_overrides(cli_overrides).run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
