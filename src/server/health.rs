//! Health check endpoints
//!
//! - `/health/live`: the process is running
//! - `/health/ready`: a refresh has succeeded and the last one did too
//! - `/health`: poller and media cache details

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::poller::PollerState;

use super::AppState;

// ============================================================================
// Health Status Types
// ============================================================================

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Health implied by the poller lifecycle
    pub fn of_poller(state: PollerState) -> Self {
        match state {
            PollerState::Active => HealthStatus::Healthy,
            PollerState::Degraded => HealthStatus::Degraded,
            PollerState::Uninitialized | PollerState::AuthFailed | PollerState::Stopped => {
                HealthStatus::Unhealthy
            }
        }
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub state: PollerState,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Comprehensive health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub checks: Vec<ComponentHealth>,
}

// ============================================================================
// Health Check Router
// ============================================================================

pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/health", get(health_check))
        .with_state(state)
}

// ============================================================================
// Health Check Handlers
// ============================================================================

async fn liveness_probe() -> impl IntoResponse {
    let response = LivenessResponse {
        status: HealthStatus::Healthy,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

/// 200 while the published view comes from a successful refresh, 503 otherwise
async fn readiness_probe(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.fleet.poller.current();
    let ready = view.last_update_success;

    let response = ReadinessResponse {
        ready,
        state: view.state,
        timestamp: chrono::Utc::now().to_rfc3339(),
        last_error: view.last_error,
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.fleet.poller.current();
    let poller_status = HealthStatus::of_poller(view.state);

    let mut checks = vec![ComponentHealth {
        name: "poller".to_string(),
        status: poller_status,
        message: Some(match &view.last_error {
            Some(error) => format!("{}: {error}", view.state.as_str()),
            None => format!(
                "{} ({} players, {} online)",
                view.state.as_str(),
                view.snapshot.len(),
                view.snapshot.online_count()
            ),
        }),
    }];

    let media = &state.fleet.media;
    let cache_stats = media.stats();
    checks.push(ComponentHealth {
        name: "media_cache".to_string(),
        status: HealthStatus::Healthy,
        message: Some(match media.age().await {
            Some(age) => format!(
                "cached {}s ago, hit rate {:.0}%",
                age.as_secs(),
                cache_stats.hit_rate() * 100.0
            ),
            None => "empty".to_string(),
        }),
    });

    let response = HealthResponse {
        status: poller_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks,
    };

    (poller_status.status_code(), Json(response))
}

// ============================================================================
// Tests
// ============================================================================
