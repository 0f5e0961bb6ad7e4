//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use workspace_server::lifecycle::startup::build_dispatcher;
use workspace_server::{Dispatcher, HttpServer, ServerConfig, Shutdown};

pub const ANIMALS: &str = r#"
const SUPPORTED_METHODS = ["GET", "POST"];

fn handle(request) {
    if request.method == "POST" {
        return #{ received: request.json };
    }
    #{ animals: [#{ id: 1, name: "Mia Cat" }] }
}
"#;

/// A throwaway workspace directory.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `handlers/{name}.rhai` in `project`, creating directories as needed.
    pub fn write_handler(&self, project: &str, name: &str, source: &str) -> PathBuf {
        self.write_file(project, &format!("handlers/{}.rhai", name), source)
    }

    /// Write a file relative to the project root.
    pub fn write_file(&self, project: &str, relative: &str, contents: &str) -> PathBuf {
        let path = self.root().join(project).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Rewrite a file and push its mtime forward so the change is always observable.
    pub fn rewrite(&self, path: &Path, contents: &str) {
        let before = fs::metadata(path).unwrap().modified().unwrap();
        fs::write(path, contents).unwrap();
        bump_mtime(path, before + Duration::from_secs(5));
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.workspace.dir = self.root().to_path_buf();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config
    }
}

pub fn bump_mtime(path: &Path, to: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(to)
        .unwrap();
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dispatcher: Arc<Dispatcher>,
    pub config_tx: mpsc::UnboundedSender<ServerConfig>,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        let dispatcher = Arc::new(build_dispatcher(&config));
        let server = HttpServer::with_dispatcher(config, Arc::clone(&dispatcher));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (config_tx, config_rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let shutdown_rx = shutdown.subscribe();

        tokio::spawn(async move {
            server.run(listener, config_rx, shutdown_rx).await.unwrap();
        });

        Self { addr, dispatcher, config_tx, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
