pub mod fleet;
pub mod login;
pub mod player;
pub mod serve;

use anyhow::{Context, Result};
use clap::ValueEnum;

use anthias_fleet::actions::FleetHandle;
use anthias_fleet::config::Config;

// Re-export command functions for convenience
pub use fleet::{media, snapshot, watch};
pub use login::login;
pub use player::{deploy, player};
pub use serve::serve;

/// Output format for listing commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Validate the config and wire up the configured fleet
fn connect(config: &Config) -> Result<FleetHandle> {
    config.validate_with_token()?;

    FleetHandle::connect(
        &config.fleet_manager.name,
        config.client_config(),
        config.poller_config(),
        config.media_ttl(),
    )
    .context("Failed to create Fleet Manager client")
}

/// Wait for Ctrl+C, logging if the signal handler cannot be installed
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
        }
        Err(e) => {
            tracing::error!("Failed to wait for Ctrl+C: {}", e);
        }
    }
}
