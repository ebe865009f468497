//! anthias-fleet - Anthias Fleet Manager polling coordinator
//!
//! Keeps one consistent, periodically refreshed snapshot of every signage
//! player managed by a Fleet Manager, serves it to any number of observers
//! without re-fetching, and forwards control commands to players.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`client`] - Fleet Manager REST client and the [`client::FleetSource`] seam
//! - [`models`] - Player records, snapshots and command payloads
//! - [`snapshot`] - Builds one fleet snapshot per cycle with per-call isolation
//! - [`poller`] - Refresh timer, coalescing and atomic publication
//! - [`cache`] - TTL cache for the media library
//! - [`readings`] - Per-player readings and derived views
//! - [`actions`] - Player commands, dispatch and the fleet registry
//! - [`server`] - HTTP status and command surface
//! - [`metrics`] - Prometheus metrics
//! - [`config`] - Configuration management and settings
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use anthias_fleet::actions::FleetHandle;
//! use anthias_fleet::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate_with_token()?;
//!
//!     let fleet = FleetHandle::connect(
//!         &config.fleet_manager.name,
//!         config.client_config(),
//!         config.poller_config(),
//!         config.media_ttl(),
//!     )?;
//!     fleet.poller.first_refresh().await?;
//!     fleet.poller.start();
//!
//!     let view = fleet.poller.current();
//!     println!("{} players, {} online", view.snapshot.len(), view.snapshot.online_count());
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod poller;
pub mod readings;
pub mod server;
pub mod snapshot;

#[cfg(test)]
mod test_support;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::actions::{ActionDispatcher, FleetCommand, FleetHandle, FleetRegistry};
    pub use crate::client::{ApiError, ClientConfig, FleetClient, FleetSource};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, FleetErrorTrait, Result};
    pub use crate::models::{FleetSnapshot, PlayerSnapshot};
    pub use crate::poller::{FleetPoller, FleetView, PollEvent, PollerConfig, PollerState};
}

// Direct re-exports for convenience
pub use models::{FleetSnapshot, PlayerRecord, PlayerSnapshot};
