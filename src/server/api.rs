//! REST API handlers for the fleet status server

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::actions::{ActionError, FleetCommand};
use crate::error::{Error, ErrorCategory, FleetErrorTrait};
use crate::metrics;
use crate::models::PlayerSnapshot;
use crate::poller::{PollerState, RefreshError};
use crate::readings::{fleet_readings, player_readings, PlayerView, Reading};
use crate::snapshot::CycleStats;

use super::health::create_health_router;
use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Fleet overview
#[derive(Debug, Serialize)]
pub struct FleetResponse {
    pub fleet: String,
    pub state: PollerState,
    pub last_update_success: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub player_count: usize,
    pub online_count: usize,
    pub players: Vec<PlayerView>,
}

/// One player with its readings
#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    pub view: PlayerView,
    pub snapshot: PlayerSnapshot,
    pub readings: Vec<Reading>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Joined a cycle that was already running
    pub coalesced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CycleStats>,
}

#[derive(Debug, Serialize)]
pub struct ScreenshotResponse {
    pub url: String,
    pub image_hash: Option<String>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Fleet endpoints
        .route("/api/fleet", get(get_fleet))
        .route("/api/fleet/readings", get(get_readings))
        .route("/api/fleet/refresh", post(refresh_fleet))
        // Player endpoints
        .route("/api/fleet/players/{id}", get(get_player))
        .route("/api/fleet/players/{id}/commands", post(send_command))
        .route("/api/fleet/players/{id}/screenshot", get(get_screenshot))
        // Media library
        .route("/api/media", get(list_media))
        // Prometheus
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    api.merge(create_health_router(state))
        .layer(middleware::from_fn(track_requests))
}

/// Record request count and latency per matched route
async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Fleet Handlers
// ============================================================================

async fn get_fleet(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.fleet.poller.current();

    let mut players: Vec<PlayerView> = view
        .snapshot
        .players()
        .map(|p| PlayerView::of(p, view.last_update_success))
        .collect();
    players.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ApiResponse::success(FleetResponse {
        fleet: state.fleet.name.clone(),
        state: view.state,
        last_update_success: view.last_update_success,
        refreshed_at: view.refreshed_at,
        last_error: view.last_error.clone(),
        player_count: view.snapshot.len(),
        online_count: view.snapshot.online_count(),
        players,
    }))
}

async fn get_readings(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.fleet.poller.current();
    Json(ApiResponse::success(fleet_readings(
        &view.snapshot,
        view.last_update_success,
    )))
}

/// Run a cycle now, or join the one in flight
async fn refresh_fleet(State(state): State<AppState>) -> Response {
    match state.fleet.poller.refresh().await {
        Ok(stats) => Json(ApiResponse::success(RefreshResponse {
            coalesced: stats.is_none(),
            stats,
        }))
        .into_response(),
        Err(e) => Error::from(e).into_response(),
    }
}

// ============================================================================
// Player Handlers
// ============================================================================

async fn get_player(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let view = state.fleet.poller.current();

    match view.snapshot.get(&id) {
        Some(player) => Json(ApiResponse::success(PlayerResponse {
            view: PlayerView::of(player, view.last_update_success),
            readings: player_readings(player, view.last_update_success),
            snapshot: player.clone(),
        }))
        .into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Player not found: {id}")),
    }
}

/// Send a command to a player
///
/// The body is a command object without `player_id`, e.g.
/// `{"command": "delete_asset", "asset_id": "a1"}`; the id comes from the path.
async fn send_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let command = match command_for_player(&id, body) {
        Ok(command) => command,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.fleet.dispatcher().dispatch(&command).await {
        Ok(result) => Json(ApiResponse::success(result)).into_response(),
        Err(e) => Error::from(e).into_response(),
    }
}

fn command_for_player(player_id: &str, body: Value) -> Result<FleetCommand, String> {
    let Value::Object(mut fields) = body else {
        return Err("Command body must be a JSON object".to_string());
    };
    fields.insert("player_id".to_string(), Value::String(player_id.to_string()));
    serde_json::from_value(Value::Object(fields)).map_err(|e| format!("Invalid command: {e}"))
}

async fn get_screenshot(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let view = state.fleet.poller.current();
    let image_hash = view
        .snapshot
        .get(&id)
        .and_then(crate::readings::views::image_hash);

    Json(ApiResponse::success(ScreenshotResponse {
        url: state.fleet.client.screenshot_url(&id),
        image_hash,
    }))
}

// ============================================================================
// Media Handlers
// ============================================================================

async fn list_media(State(state): State<AppState>) -> Response {
    match state.fleet.media.get().await {
        Ok(files) => Json(ApiResponse::success(files)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Media library fetch failed");
            Error::from(e).into_response()
        }
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

impl Error {
    /// HTTP status a client of the status server sees for this error
    ///
    /// Upstream auth failures are the server's problem, not the caller's,
    /// so they surface as 502 rather than 401.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Refresh(RefreshError::Stopped) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Action(ActionError::UnknownFleet(_)) => StatusCode::NOT_FOUND,
            _ if self.api_error().is_some_and(|e| e.is_timeout()) => StatusCode::GATEWAY_TIMEOUT,
            _ => match self.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Authentication | ErrorCategory::Network => StatusCode::BAD_GATEWAY,
                ErrorCategory::Config | ErrorCategory::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error_response(self.http_status(), self.user_message())
    }
}

// ============================================================================
// Metrics Handler
// ============================================================================

async fn metrics_handler() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
