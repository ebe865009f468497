//! Prometheus metrics for the fleet poller
//!
//! This module tracks:
//! - Refresh cycles: result, duration, fleet size
//! - Sub-fetch failures per snapshot field
//! - Media library cache hits and misses
//! - HTTP API requests served by the status server
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec, CounterVec,
    Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

use crate::snapshot::{CycleStats, SnapshotField};

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for poller metrics
struct PollerMetrics {
    cycles: CounterVec,
    cycle_duration: Histogram,
    players: Gauge,
    online_players: Gauge,
    field_failures: CounterVec,
    media_cache: CounterVec,
}

/// Container for status server metrics
struct ServerMetrics {
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

static POLLER_METRICS: OnceLock<PollerMetrics> = OnceLock::new();

static SERVER_METRICS: OnceLock<ServerMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Call once at startup. Later calls return `Ok(())` without re-registering.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = anthias_fleet::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let poller = PollerMetrics {
        cycles: register_counter_vec!(
            "anthias_fleet_refresh_cycles_total",
            "Refresh cycles by result",
            &["result"]
        )?,
        cycle_duration: register_histogram!(
            "anthias_fleet_refresh_duration_seconds",
            "Refresh cycle duration in seconds",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        players: register_gauge!(
            "anthias_fleet_players",
            "Players returned by the last successful refresh"
        )?,
        online_players: register_gauge!(
            "anthias_fleet_online_players",
            "Online players in the last successful refresh"
        )?,
        field_failures: register_counter_vec!(
            "anthias_fleet_subfetch_failures_total",
            "Failed per-player sub-fetches by field",
            &["field"]
        )?,
        media_cache: register_counter_vec!(
            "anthias_fleet_media_cache_total",
            "Media library reads by cache result",
            &["result"]
        )?,
    };

    let server = ServerMetrics {
        api_requests: register_counter_vec!(
            "anthias_fleet_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "anthias_fleet_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
        )?,
    };

    // Every field reports from the first scrape, even before a failure
    for field in SnapshotField::ALL {
        poller.field_failures.with_label_values(&[field.as_str()]);
    }

    POLLER_METRICS
        .set(poller)
        .map_err(|_| "Poller metrics already initialized")?;
    SERVER_METRICS
        .set(server)
        .map_err(|_| "Server metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    POLLER_METRICS.get().is_some() && SERVER_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a completed cycle
pub fn record_cycle_success(stats: &CycleStats) {
    let Some(m) = POLLER_METRICS.get() else {
        return;
    };

    m.cycles.with_label_values(&["success"]).inc();
    m.cycle_duration.observe(stats.duration.as_secs_f64());
    m.players.set(stats.players as f64);
    m.online_players.set(stats.online as f64);

    for field in SnapshotField::ALL {
        let failures = stats.failures(field);
        if failures > 0 {
            m.field_failures
                .with_label_values(&[field.as_str()])
                .inc_by(failures as f64);
        }
    }
}

/// Record a failed cycle
pub fn record_cycle_failure(auth: bool, duration: Duration) {
    let Some(m) = POLLER_METRICS.get() else {
        return;
    };

    let result = if auth { "auth_failed" } else { "failed" };
    m.cycles.with_label_values(&[result]).inc();
    m.cycle_duration.observe(duration.as_secs_f64());
}

/// Record a media library cache read
pub fn record_media_cache(hit: bool) {
    if let Some(m) = POLLER_METRICS.get() {
        let result = if hit { "hit" } else { "miss" };
        m.media_cache.with_label_values(&[result]).inc();
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = SERVER_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok());

        // Idempotent
        let result2 = init_metrics();
        assert!(result2.is_ok());
    }

    #[test]
    fn test_metrics_initialized() {
        ensure_metrics_initialized();
        assert!(metrics_initialized());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        record_cycle_failure(false, Duration::from_millis(5));

        let text = encode_metrics().unwrap();
        assert!(text.contains("anthias_fleet_refresh_cycles_total"));
    }

    #[test]
    fn test_field_failures_registered_for_every_field() {
        ensure_metrics_initialized();

        let text = encode_metrics().unwrap();
        for field in SnapshotField::ALL {
            assert!(
                text.contains(&format!("field=\"{}\"", field.as_str())),
                "missing series for {field}"
            );
        }
    }

    #[test]
    fn test_cycle_recording() {
        ensure_metrics_initialized();
        let stats = CycleStats {
            players: 3,
            online: 2,
            field_failures: BTreeMap::from([(SnapshotField::Cec, 1)]),
            auth_failures: 0,
            duration: Duration::from_millis(120),
        };
        record_cycle_success(&stats);
        record_cycle_failure(true, Duration::from_millis(10));
        record_media_cache(true);
        record_media_cache(false);
        record_api_request("/api/fleet", 200, 0.002);
    }
}
