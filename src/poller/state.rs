//! Published poller state, events and errors

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::client::ApiError;
use crate::models::FleetSnapshot;

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerState {
    /// No cycle has succeeded yet
    #[default]
    Uninitialized,
    /// Last cycle succeeded
    Active,
    /// Last cycle failed; previous snapshot still published
    Degraded,
    /// Credentials rejected; timer cycles paused until resumed
    AuthFailed,
    /// Torn down
    Stopped,
}

impl PollerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::AuthFailed => "auth_failed",
            Self::Stopped => "stopped",
        }
    }
}

/// What observers see after each cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetView {
    pub snapshot: Arc<FleetSnapshot>,
    pub last_update_success: bool,
    pub state: PollerState,
    /// Time of the last successful cycle
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Poll events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// Cycle completed and a new snapshot was published
    Refreshed {
        players: usize,
        online: usize,
        failures: usize,
        duration_ms: u64,
    },

    /// Cycle failed; previous snapshot kept
    RefreshFailed { error: String },

    /// Credentials rejected; re-authorization needed
    AuthenticationFailed { error: String },

    /// Poller stopped
    Stopped,
}

/// Outcome of a non-blocking refresh request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshRequest {
    /// A new cycle will run
    Scheduled,
    /// A cycle is already running and will serve this request
    Coalesced,
}

/// Why a refresh did not publish a new snapshot
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    /// Credentials rejected; needs re-authorization
    #[error("Fleet Manager authentication failed: {0}")]
    AuthFailed(#[source] ApiError),

    /// Fleet Manager unreachable or returned an error
    #[error("Fleet refresh failed: {0}")]
    UpdateFailed(#[source] ApiError),

    /// Poller was stopped
    #[error("Fleet poller stopped")]
    Stopped,
}

impl RefreshError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthFailed(_))
    }
}

impl From<ApiError> for RefreshError {
    fn from(error: ApiError) -> Self {
        if error.is_auth() {
            Self::AuthFailed(error)
        } else {
            Self::UpdateFailed(error)
        }
    }
}
