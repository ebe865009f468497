use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use anthias_fleet::config::Config;
use anthias_fleet::poller::{FleetView, PollEvent};
use anthias_fleet::readings::{fleet_readings, PlaybackState, PlayerView, Reading, ReadingValue};
use anthias_fleet::snapshot::CycleStats;

use super::{connect, shutdown_signal, OutputFormat};

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    fleet: &'a str,
    #[serde(flatten)]
    view: &'a FleetView,
    stats: Option<CycleStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    readings: Option<Vec<Reading>>,
}

/// Run one cycle and print what was published
pub async fn snapshot(config: &Config, format: OutputFormat, with_readings: bool) -> Result<()> {
    let handle = connect(config)?;

    let stats = handle
        .poller
        .refresh()
        .await
        .context("Refresh failed")?;
    let view = handle.poller.current();

    match format {
        OutputFormat::Json => {
            let output = SnapshotOutput {
                fleet: &handle.name,
                view: &view,
                stats,
                readings: with_readings
                    .then(|| fleet_readings(&view.snapshot, view.last_update_success)),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print_fleet_table(&handle.name, &view, stats.as_ref());
            if with_readings {
                print_readings(&fleet_readings(&view.snapshot, view.last_update_success));
            }
        }
    }

    Ok(())
}

fn print_fleet_table(fleet: &str, view: &FleetView, stats: Option<&CycleStats>) {
    println!("Fleet: {fleet}");
    println!("==========");
    println!(
        "  Players: {} ({} online)",
        view.snapshot.len(),
        view.snapshot.online_count()
    );
    if let Some(stats) = stats {
        println!(
            "  Cycle: {}ms, {} sub-fetch failures",
            stats.duration.as_millis(),
            stats.total_failures()
        );
    }
    println!();

    let mut players: Vec<PlayerView> = view
        .snapshot
        .players()
        .map(|p| PlayerView::of(p, view.last_update_success))
        .collect();
    players.sort_by(|a, b| a.id.cmp(&b.id));

    println!(
        "{:<12} {:<24} {:<8} {:<8} {:<6} {}",
        "ID", "NAME", "ONLINE", "STATE", "TV", "NOW PLAYING"
    );
    for player in players {
        let state = match player.playback {
            PlaybackState::Off => "off",
            PlaybackState::Playing => "playing",
            PlaybackState::Idle => "idle",
        };
        let tv = match (player.display_power.available, player.display_power.on) {
            (false, _) => "-",
            (true, true) => "on",
            (true, false) => "off",
        };
        println!(
            "{:<12} {:<24} {:<8} {:<8} {:<6} {}",
            truncate(&player.id, 12),
            truncate(&player.name, 24),
            if player.online { "yes" } else { "no" },
            state,
            tv,
            player.media_title.as_deref().unwrap_or("-"),
        );
    }
}

fn print_readings(readings: &[Reading]) {
    println!();
    println!("Readings");
    println!("========");
    for reading in readings {
        let value = match &reading.value {
            Some(ReadingValue::Number(n)) => n.to_string(),
            Some(ReadingValue::Count(n)) => n.to_string(),
            Some(ReadingValue::Text(s)) => s.clone(),
            None => "-".to_string(),
        };
        let marker = if reading.available { "" } else { " (unavailable)" };
        println!(
            "  {:<40} {}{}{}",
            reading.name,
            value,
            reading.unit.map(|u| format!(" {u}")).unwrap_or_default(),
            marker
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Poll until Ctrl+C, logging every event
pub async fn watch(config: &Config) -> Result<()> {
    let handle = connect(config)?;
    let poller = handle.poller.clone();

    println!("Watching fleet '{}' every {}s", handle.name, poller.scan_interval().as_secs());
    println!("Press Ctrl+C to stop.\n");

    let mut events = poller.events();

    if let Err(e) = poller.first_refresh().await {
        tracing::warn!(error = %e, "Initial refresh failed; polling continues");
    } else {
        let view = poller.current();
        tracing::info!(
            players = view.snapshot.len(),
            online = view.snapshot.online_count(),
            "Initial refresh complete"
        );
    }
    poller.start();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(PollEvent::Refreshed { players, online, failures, duration_ms }) => {
                    tracing::info!(players, online, failures, duration_ms, "Fleet refreshed");
                }
                Ok(PollEvent::RefreshFailed { error }) => {
                    tracing::warn!(error = %error, "Refresh failed; keeping previous snapshot");
                }
                Ok(PollEvent::AuthenticationFailed { error }) => {
                    tracing::error!(error = %error, "Fleet Manager rejected the token; run `anthias-fleet login`");
                }
                Ok(PollEvent::Stopped) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    poller.stop().await;
    println!("Watch stopped.");
    Ok(())
}

/// Print the media library
pub async fn media(config: &Config, format: OutputFormat) -> Result<()> {
    let handle = connect(config)?;
    let files = handle
        .media
        .get()
        .await
        .context("Failed to fetch media library")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&files)?),
        OutputFormat::Table => {
            println!("Media library ({} files)", files.len());
            println!("==============");
            println!("{:<10} {:<40} {}", "ID", "NAME", "TYPE");
            for file in &files {
                let kind = file
                    .extra
                    .get("file_type")
                    .or_else(|| file.extra.get("mimetype"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("-");
                println!(
                    "{:<10} {:<40} {}",
                    file.id.as_deref().unwrap_or("-"),
                    truncate(file.name.as_deref().unwrap_or("-"), 40),
                    kind
                );
            }
        }
    }

    Ok(())
}
