// Core data structures for the fleet snapshot and Fleet Manager payloads

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ============================================================================
// Player list
// ============================================================================

/// One entry of `GET /api/players/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub last_seen: Option<String>,
    /// Last status the Fleet Manager stored for the player (same shape as live info)
    #[serde(default)]
    pub last_status: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlayerRecord {
    /// Display name, falling back to the id
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.clone())
    }

    pub fn online(&self) -> bool {
        self.is_online.unwrap_or(false)
    }
}

// ============================================================================
// Per-player sub-resources
// ============================================================================

/// Resource metrics reported by a player
///
/// Kept as the raw JSON mapping so unknown keys pass through untouched;
/// typed accessors read the well-known keys leniently (numbers may arrive
/// as JSON strings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerInfo(pub Map<String, Value>);

impl PlayerInfo {
    /// Build from a JSON value; only non-empty objects qualify
    pub fn from_status(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(Self(map.clone())),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn cpu_temp(&self) -> Option<f64> {
        self.0.get("cpu_temp").and_then(lenient_f64)
    }

    pub fn cpu_usage(&self) -> Option<f64> {
        self.0.get("cpu_usage").and_then(lenient_f64)
    }

    pub fn memory_total(&self) -> Option<f64> {
        self.nested("memory", "total")
    }

    pub fn memory_used(&self) -> Option<f64> {
        self.nested("memory", "used")
    }

    pub fn disk_total_gb(&self) -> Option<f64> {
        self.nested("disk_usage", "total_gb")
    }

    pub fn disk_free_gb(&self) -> Option<f64> {
        self.nested("disk_usage", "free_gb")
    }

    pub fn uptime_days(&self) -> Option<f64> {
        self.nested("uptime", "days")
    }

    pub fn uptime_hours(&self) -> Option<f64> {
        self.nested("uptime", "hours")
    }

    pub fn anthias_version(&self) -> Option<&str> {
        self.0.get("anthias_version").and_then(Value::as_str)
    }

    pub fn device_model(&self) -> Option<&str> {
        self.0.get("device_model").and_then(Value::as_str)
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.0.get("mac_address").and_then(Value::as_str)
    }

    /// Reported addresses, stringified
    pub fn ip_addresses(&self) -> Vec<String> {
        match self.0.get("ip_addresses") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn nested(&self, outer: &str, inner: &str) -> Option<f64> {
        self.0
            .get(outer)
            .and_then(Value::as_object)
            .and_then(|m| m.get(inner))
            .and_then(lenient_f64)
    }
}

/// HDMI-CEC state of the connected display
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CecStatus {
    #[serde(default, deserialize_with = "bool_or_null")]
    pub cec_available: bool,
    #[serde(default, deserialize_with = "bool_or_null")]
    pub tv_on: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Asset currently on screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub asset_name: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NowPlaying {
    /// Decode a now-playing payload. `null` and `{}` both mean nothing is playing.
    pub fn from_payload(value: Value) -> Result<Option<Self>, serde_json::Error> {
        match value {
            Value::Null => Ok(None),
            Value::Object(ref map) if map.is_empty() => Ok(None),
            other => serde_json::from_value(other).map(Some),
        }
    }
}

/// A schedule slot as listed by the player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slot_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Scheduler status, possibly naming the active slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStatus {
    #[serde(default)]
    pub active_slot: Option<ScheduleSlot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of the shared media library (`GET /api/media/`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Snapshot
// ============================================================================

/// State of one player as of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub name: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub info: PlayerInfo,
    /// Present only when the player is online and the CEC fetch succeeded
    pub cec: Option<CecStatus>,
    pub now_playing: Option<NowPlaying>,
    pub schedule_slots: Vec<ScheduleSlot>,
    pub schedule_status: ScheduleStatus,
}

impl PlayerSnapshot {
    /// Seed an entry from a list record. Live fields stay at their defaults.
    pub fn seed(record: &PlayerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.display_name(),
            is_online: record.online(),
            last_seen: record.last_seen.clone(),
            info: record
                .last_status
                .as_ref()
                .and_then(PlayerInfo::from_status)
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Whether any field that only an online fetch can fill is populated
    pub fn has_live_fields(&self) -> bool {
        self.cec.is_some()
            || self.now_playing.is_some()
            || !self.schedule_slots.is_empty()
            || self.schedule_status != ScheduleStatus::default()
    }
}

/// All players of one refresh cycle, keyed by player id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FleetSnapshot {
    players: HashMap<String, PlayerSnapshot>,
}

impl FleetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry under its own id, replacing any previous one
    pub fn insert(&mut self, player: PlayerSnapshot) {
        self.players.insert(player.id.clone(), player);
    }

    pub fn get(&self, id: &str) -> Option<&PlayerSnapshot> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.is_online).count()
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        self.players.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }
}

impl FromIterator<PlayerSnapshot> for FleetSnapshot {
    fn from_iter<I: IntoIterator<Item = PlayerSnapshot>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for player in iter {
            snapshot.insert(player);
        }
        snapshot
    }
}

// ============================================================================
// Action payloads
// ============================================================================

/// Playback skip direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Next,
    Previous,
}

impl PlaybackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

/// Kind of asset a player can show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetMimetype {
    #[default]
    Webpage,
    Image,
    Video,
}

impl AssetMimetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webpage => "webpage",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "webpage" => Some(Self::Webpage),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Kind of schedule slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    #[default]
    Default,
    Time,
    Event,
}

impl SlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Time => "time",
            Self::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Some(Self::Default),
            "time" => Some(Self::Time),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Body of `asset-create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    pub name: String,
    pub uri: String,
    /// Seconds, sent as a string
    pub duration: String,
    pub mimetype: AssetMimetype,
}

/// Body of `asset-update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub asset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Body of `schedule-slot-create`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewScheduleSlot {
    pub slot_type: SlotType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
}

/// Body of `POST /api/deploy/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub player_id: String,
    pub media_file_id: String,
}

// ============================================================================
// Serde helpers
// ============================================================================

fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_id(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(value).ok_or_else(|| serde::de::Error::custom("expected string or number id"))
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(None),
        other => value_to_id(other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected string or number id")),
    }
}

fn bool_or_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_record_numeric_id() {
        let record: PlayerRecord =
            serde_json::from_value(json!({"id": 42, "name": "Lobby", "is_online": true})).unwrap();

        assert_eq!(record.id, "42");
        assert!(record.online());
        assert_eq!(record.display_name(), "Lobby");
    }

    #[test]
    fn test_player_record_defaults() {
        let record: PlayerRecord = serde_json::from_value(json!({"id": "p9"})).unwrap();

        assert_eq!(record.display_name(), "p9");
        assert!(!record.online());
        assert!(record.last_seen.is_none());
    }

    #[test]
    fn test_seed_uses_last_status_as_info() {
        let record: PlayerRecord = serde_json::from_value(json!({
            "id": "p1",
            "name": "Lobby",
            "is_online": false,
            "last_seen": "2024-05-01T10:00:00Z",
            "last_status": {"cpu_usage": 10}
        }))
        .unwrap();

        let snapshot = PlayerSnapshot::seed(&record);
        assert_eq!(snapshot.info.cpu_usage(), Some(10.0));
        assert_eq!(snapshot.last_seen.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert!(!snapshot.has_live_fields());
    }

    #[test]
    fn test_seed_ignores_empty_last_status() {
        let record: PlayerRecord =
            serde_json::from_value(json!({"id": "p1", "last_status": {}})).unwrap();
        assert!(PlayerSnapshot::seed(&record).info.is_empty());

        let record: PlayerRecord =
            serde_json::from_value(json!({"id": "p1", "last_status": null})).unwrap();
        assert!(PlayerSnapshot::seed(&record).info.is_empty());
    }

    #[test]
    fn test_player_info_accessors() {
        let info: PlayerInfo = serde_json::from_value(json!({
            "cpu_temp": "48.3",
            "memory": {"total": 7820, "used": 970},
            "disk_usage": {"total_gb": 28.8, "free_gb": 20.1},
            "uptime": {"days": 2, "hours": 5.3},
            "device_model": "Raspberry Pi 4 Model B Rev 1.5",
            "ip_addresses": ["http://10.0.0.5/", 7]
        }))
        .unwrap();

        assert_eq!(info.cpu_temp(), Some(48.3));
        assert_eq!(info.memory_total(), Some(7820.0));
        assert_eq!(info.disk_free_gb(), Some(20.1));
        assert_eq!(info.uptime_days(), Some(2.0));
        assert_eq!(info.device_model(), Some("Raspberry Pi 4 Model B Rev 1.5"));
        assert_eq!(info.ip_addresses(), vec!["http://10.0.0.5/", "7"]);
        assert!(info.mac_address().is_none());
    }

    #[test]
    fn test_now_playing_empty_payloads() {
        assert_eq!(NowPlaying::from_payload(Value::Null).unwrap(), None);
        assert_eq!(NowPlaying::from_payload(json!({})).unwrap(), None);

        let playing = NowPlaying::from_payload(json!({
            "asset_id": 7,
            "asset_name": "Menu",
            "mimetype": "image"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(playing.asset_id.as_deref(), Some("7"));
        assert_eq!(playing.mimetype.as_deref(), Some("image"));
    }

    #[test]
    fn test_cec_status_null_flags() {
        let cec: CecStatus =
            serde_json::from_value(json!({"cec_available": true, "tv_on": null})).unwrap();
        assert!(cec.cec_available);
        assert!(!cec.tv_on);
    }

    #[test]
    fn test_fleet_snapshot_keys_by_id() {
        let snapshot: FleetSnapshot = vec![
            PlayerSnapshot {
                id: "a".into(),
                is_online: true,
                ..Default::default()
            },
            PlayerSnapshot {
                id: "b".into(),
                ..Default::default()
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.online_count(), 1);
        assert!(snapshot.contains("a"));
        assert!(snapshot.get("c").is_none());
    }

    #[test]
    fn test_new_schedule_slot_skips_missing_fields() {
        let slot = NewScheduleSlot {
            slot_type: SlotType::Time,
            name: "Morning".into(),
            start_time: Some("08:00".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(&slot).unwrap();

        assert_eq!(body, json!({"slot_type": "time", "name": "Morning", "start_time": "08:00"}));
    }
}
