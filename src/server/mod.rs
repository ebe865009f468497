//! Fleet status server
//!
//! Serves the published fleet view, per-player readings and the command
//! surface over HTTP. Handlers only read what the poller already
//! published; the one exception is `POST /api/fleet/refresh`.

pub mod api;
pub mod health;

use std::net::SocketAddr;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::actions::FleetHandle;

pub use api::create_router;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    /// The fleet being served
    pub fleet: FleetHandle,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(fleet: FleetHandle) -> Self {
        Self {
            fleet,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Fleet Server
// ============================================================================

/// HTTP server for one fleet
pub struct FleetServer {
    bind_address: SocketAddr,
    state: AppState,
    enable_cors: bool,
}

impl FleetServer {
    pub fn new(bind_address: SocketAddr, fleet: FleetHandle) -> Self {
        Self {
            bind_address,
            state: AppState::new(fleet),
            enable_cors: true,
        }
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|e| ServerError::Bind(self.bind_address, e))?;

        tracing::info!(
            fleet = %self.state.fleet.name,
            address = %self.bind_address,
            "Fleet status server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Fleet status server shutdown complete");
        Ok(())
    }
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}
