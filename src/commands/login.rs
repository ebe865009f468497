use anyhow::{Context, Result};

use anthias_fleet::client::FleetClient;
use anthias_fleet::config::Config;

/// Exchange credentials for a token and print it
///
/// Only the token goes to stdout so it can be captured directly.
pub async fn login(config: &Config, username: &str, password: &str, url: Option<String>) -> Result<()> {
    let url = url.unwrap_or_else(|| config.fleet_manager.url.clone());

    let token = FleetClient::obtain_token_with_timeout(&url, username, password, config.token_timeout())
        .await
        .with_context(|| format!("Login to {url} failed"))?;

    tracing::info!(url = %url, "Token obtained");
    println!("{token}");
    eprintln!("Set FLEET_TOKEN or `token` under [fleet_manager] in the config file to use it.");
    Ok(())
}
