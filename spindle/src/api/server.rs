//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::error::Result;
use crate::jobs::JobRunner;
use crate::metadata::MetadataProvider;
use crate::playlist::refresher::MetadataRefresher;
use crate::playlist::registry::PlaylistRegistry;
use crate::sync::SyncSupervisor;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Playlist registry (always present; empty in bare test setups)
    pub registry: Arc<PlaylistRegistry>,
    /// Metadata provider for identifier extraction on manual adds
    pub provider: Option<Arc<dyn MetadataProvider>>,
    /// Metadata refresher for manual and post-add refreshes
    pub refresher: Option<Arc<MetadataRefresher>>,
    /// Sync supervisor
    pub supervisor: Option<Arc<SyncSupervisor>>,
    /// Ad hoc job runner
    pub jobs: Option<Arc<JobRunner>>,
}

impl AppState {
    /// Create a new application state without services (for testing).
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            registry: Arc::new(PlaylistRegistry::new("downloads")),
            provider: None,
            refresher: None,
            supervisor: None,
            jobs: None,
        }
    }

    /// Create application state with all services.
    pub fn with_services(
        registry: Arc<PlaylistRegistry>,
        provider: Arc<dyn MetadataProvider>,
        refresher: Arc<MetadataRefresher>,
        supervisor: Arc<SyncSupervisor>,
        jobs: Arc<JobRunner>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            registry,
            provider: Some(provider),
            refresher: Some(refresher),
            supervisor: Some(supervisor),
            jobs: Some(jobs),
        }
    }

    /// Replace the registry.
    pub fn with_registry(mut self, registry: Arc<PlaylistRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the sync supervisor.
    pub fn with_supervisor(mut self, supervisor: Arc<SyncSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Set the job runner.
    pub fn with_jobs(mut self, jobs: Arc<JobRunner>) -> Self {
        self.jobs = Some(jobs);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create with custom state.
    pub fn with_state(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::Error::config(format!("Invalid bind address: {e}")))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| crate::Error::Other(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::Error::Other(format!("Server error: {e}")))?;

        Ok(())
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
