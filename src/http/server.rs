//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, body limit, CORS)
//! - Apply configuration updates from the watcher
//! - Bind server to listener and shut down gracefully

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware,
    routing::{any, get},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::api::{dispatch_api, list_handlers, workspace_info};
use crate::http::middleware::cors_headers;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::static_files::{project_index, project_path};
use crate::lifecycle::startup::build_dispatcher;
use crate::runtime::Dispatcher;
use crate::workspace::Workspace;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live configuration, replaced atomically on reload.
    pub config: Arc<ArcSwap<ServerConfig>>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Workspace view for the current configuration snapshot.
    pub fn workspace(&self) -> Workspace {
        let config = self.config.load();
        Workspace::new(
            config.workspace.dir.clone(),
            config.workspace.handlers_subdir.clone(),
        )
    }
}

/// Pre-flight answer for routes outside the handler API.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// HTTP server for the workspace dispatcher.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let dispatcher = Arc::new(build_dispatcher(&config));
        Self::with_dispatcher(config, dispatcher)
    }

    /// Create a server around an existing dispatcher (and its module cache).
    pub fn with_dispatcher(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            config: Arc::new(ArcSwap::from_pointee(config.clone())),
            dispatcher,
        };
        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(workspace_info).options(preflight))
            .route("/{project}/api/{handler}", any(dispatch_api))
            .route("/{project}/api/", get(list_handlers).options(preflight))
            .route("/{project}/api", get(list_handlers).options(preflight))
            .route("/{project}", get(project_index).options(preflight))
            .route("/{project}/", get(project_index).options(preflight))
            .route("/{project}/{*path}", get(project_path).options(preflight))
            .layer(middleware::from_fn_with_state(state.clone(), cors_headers))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request.headers()),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared state (live config and dispatcher).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. Configuration updates received meanwhile are swapped
    /// into the live config.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let live = Arc::clone(&self.state.config);
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let current = live.load();
                if new_config.listener != current.listener
                    || new_config.handlers != current.handlers
                    || new_config.timeouts != current.timeouts
                    || new_config.security != current.security
                {
                    tracing::warn!("Listener, handler limits, timeouts and body limits apply after restart");
                }
                tracing::info!(workspace = %new_config.workspace.dir.display(), "Configuration reloaded");
                live.store(Arc::new(new_config));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
