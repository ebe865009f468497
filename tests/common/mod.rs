//! Common test utilities: a mock Fleet Manager built on wiremock

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use anthias_fleet::client::{ClientConfig, FleetClient};
use anthias_fleet::poller::{FleetPoller, PollerConfig};

pub const TOKEN: &str = "test-token";

/// Client pointed at the mock server
pub fn client_for(server: &MockServer) -> Arc<FleetClient> {
    client_with_timeout(server, Duration::from_secs(5))
}

pub fn client_with_timeout(server: &MockServer, timeout: Duration) -> Arc<FleetClient> {
    let config = ClientConfig::new(server.uri(), TOKEN).with_timeout(timeout);
    Arc::new(FleetClient::new(config).expect("client"))
}

/// Poller with a long interval so only explicit refreshes run
#[allow(dead_code)]
pub fn poller_for(client: Arc<FleetClient>) -> FleetPoller<FleetClient> {
    FleetPoller::new(
        client,
        PollerConfig::default().with_scan_interval(Duration::from_secs(3600)),
    )
}

/// Mount `GET /api/players/`
#[allow(dead_code)]
pub async fn mount_players(server: &MockServer, players: Value) {
    Mock::given(method("GET"))
        .and(path("/api/players/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(players))
        .mount(server)
        .await;
}

/// Mount one per-player resource
#[allow(dead_code)]
pub async fn mount_resource(server: &MockServer, player_id: &str, resource: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/players/{player_id}/{resource}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Payloads of a healthy player, each distinct from `last_status`
#[allow(dead_code)]
pub struct LiveFixture {
    pub info: Value,
    pub cec: Value,
    pub now_playing: Value,
    pub slots: Value,
    pub status: Value,
}

impl Default for LiveFixture {
    fn default() -> Self {
        Self {
            info: json!({
                "cpu_temp": 48.26,
                "cpu_usage": 35,
                "memory": {"total": 4096, "used": 1024},
                "anthias_version": "0.19.1"
            }),
            cec: json!({"cec_available": true, "tv_on": true}),
            now_playing: json!({
                "asset_id": "a1",
                "asset_name": "Welcome Loop",
                "mimetype": "video",
                "started_at": "2026-10-01T12:00:05Z"
            }),
            slots: json!([
                {"id": 1, "name": "Morning", "slot_type": "time"},
                {"id": 2, "name": "Fallback", "slot_type": "default"}
            ]),
            status: json!({"active_slot": {"id": 1, "name": "Morning", "slot_type": "time"}}),
        }
    }
}

/// Mount all five sub-resources of one player, except `skip`
#[allow(dead_code)]
pub async fn mount_live(server: &MockServer, player_id: &str, fixture: &LiveFixture, skip: &[&str]) {
    let resources = [
        ("info", &fixture.info),
        ("cec-status", &fixture.cec),
        ("now-playing", &fixture.now_playing),
        ("schedule-slots", &fixture.slots),
        ("schedule-status", &fixture.status),
    ];
    for (resource, body) in resources {
        if !skip.contains(&resource) {
            mount_resource(server, player_id, resource, body.clone()).await;
        }
    }
}

/// The single-player list used by most tests
#[allow(dead_code)]
pub fn lobby_list() -> Value {
    json!([{
        "id": "p1",
        "name": "Lobby",
        "is_online": true,
        "last_seen": "2026-10-01T12:00:00Z",
        "last_status": {"cpu_usage": 10}
    }])
}
