use anyhow::{Context, Result};

use anthias_fleet::config::Config;
use anthias_fleet::metrics;
use anthias_fleet::server::FleetServer;

use super::{connect, shutdown_signal};

/// Poll the fleet and serve the status API until Ctrl+C
pub async fn serve(mut config: Config, bind: Option<String>, enable_cors: bool) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    let bind_address = config.bind_address()?;

    let handle = connect(&config)?;

    metrics::init_metrics().map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {e}"))?;

    println!("Starting Fleet Status Server");
    println!("============================");
    println!("  Fleet: {}", handle.name);
    println!("  Fleet Manager: {}", handle.client.base_url());
    println!("  Scan Interval: {}s", config.poller.scan_interval_secs);
    println!("  Max Concurrent Players: {}", config.poller.max_concurrent_players);
    println!("  Media Cache TTL: {}s", config.media.ttl_secs);
    println!(
        "  CORS: {}",
        if enable_cors { "enabled" } else { "disabled" }
    );
    println!();

    match handle.poller.first_refresh().await {
        Ok(()) => {
            let view = handle.poller.current();
            println!(
                "Initial refresh: {} players, {} online",
                view.snapshot.len(),
                view.snapshot.online_count()
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Initial refresh failed; serving without a snapshot");
            println!("Initial refresh failed: {e}");
        }
    }
    handle.poller.start();

    println!();
    println!("API Endpoints:");
    println!("  GET  /health/live                         - Liveness probe");
    println!("  GET  /health/ready                        - Ready once a refresh succeeded");
    println!("  GET  /api/fleet                           - Fleet overview");
    println!("  GET  /api/fleet/readings                  - Per-player readings");
    println!("  POST /api/fleet/refresh                   - Refresh now");
    println!("  GET  /api/fleet/players/{{id}}              - One player");
    println!("  POST /api/fleet/players/{{id}}/commands     - Send a command");
    println!("  GET  /api/fleet/players/{{id}}/screenshot   - Screenshot URL");
    println!("  GET  /api/media                           - Media library");
    println!("  GET  /metrics                             - Prometheus metrics endpoint");
    println!();
    println!("Listening on http://{bind_address}");
    println!("Press Ctrl+C to stop.\n");

    let server = FleetServer::new(bind_address, handle.clone()).with_cors(enable_cors);
    let result = server
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Fleet status server failed");

    handle.poller.stop().await;
    result?;

    println!("Fleet status server stopped.");
    Ok(())
}
