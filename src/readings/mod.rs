//! Per-player readings derived from a fleet snapshot
//!
//! Each metric is a static descriptor pairing a key with a pure extraction
//! function. Iterating the tables over a snapshot yields one [`Reading`]
//! per metric per player.

pub mod views;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::{FleetSnapshot, PlayerInfo, PlayerSnapshot};

pub use views::{DeviceDescriptor, DisplayPower, MediaKind, PlaybackState, PlayerView};

// ============================================================================
// Descriptor Types
// ============================================================================

/// Value of one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(f64),
    Count(u64),
    Text(String),
}

/// Metric read from a player's `info` mapping
pub struct InfoMetric {
    pub key: &'static str,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub value: fn(&PlayerInfo) -> Option<ReadingValue>,
}

/// Metric read from the whole player snapshot (schedule data)
pub struct ScheduleMetric {
    pub key: &'static str,
    pub icon: &'static str,
    pub value: fn(&PlayerSnapshot) -> Option<ReadingValue>,
    pub attributes: Option<fn(&PlayerSnapshot) -> Map<String, Value>>,
}

/// One materialized reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// `<player_id>_<key>`
    pub unique_id: String,
    pub player_id: String,
    pub key: &'static str,
    /// `<player name> <Key Title>`
    pub name: String,
    pub unit: Option<&'static str>,
    pub icon: &'static str,
    pub value: Option<ReadingValue>,
    pub available: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

// ============================================================================
// Descriptor Tables
// ============================================================================

pub static INFO_METRICS: &[InfoMetric] = &[
    InfoMetric {
        key: "cpu_temp",
        unit: Some("°C"),
        icon: "mdi:thermometer",
        value: cpu_temp,
    },
    InfoMetric {
        key: "cpu_usage",
        unit: Some("%"),
        icon: "mdi:cpu-64-bit",
        value: cpu_usage,
    },
    InfoMetric {
        key: "memory_usage",
        unit: Some("%"),
        icon: "mdi:memory",
        value: memory_percent,
    },
    InfoMetric {
        key: "disk_free",
        unit: Some("GB"),
        icon: "mdi:harddisk",
        value: disk_free_gb,
    },
    InfoMetric {
        key: "uptime",
        unit: Some("h"),
        icon: "mdi:clock-outline",
        value: uptime_hours,
    },
    InfoMetric {
        key: "ip_address",
        unit: None,
        icon: "mdi:ip-network",
        value: ip_address,
    },
    InfoMetric {
        key: "mac_address",
        unit: None,
        icon: "mdi:ethernet",
        value: mac_address,
    },
];

pub static SCHEDULE_METRICS: &[ScheduleMetric] = &[
    ScheduleMetric {
        key: "active_schedule_slot",
        icon: "mdi:calendar-clock",
        value: active_schedule_slot,
        attributes: Some(active_slot_attributes),
    },
    ScheduleMetric {
        key: "schedule_slot_count",
        icon: "mdi:calendar-multiple",
        value: schedule_slot_count,
        attributes: None,
    },
];

// ============================================================================
// Extraction Functions
// ============================================================================

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn cpu_temp(info: &PlayerInfo) -> Option<ReadingValue> {
    info.cpu_temp().map(|v| ReadingValue::Number(round1(v)))
}

fn cpu_usage(info: &PlayerInfo) -> Option<ReadingValue> {
    info.cpu_usage().map(|v| ReadingValue::Number(round1(v)))
}

// Both values must be present and non-zero
fn memory_percent(info: &PlayerInfo) -> Option<ReadingValue> {
    let total = info.memory_total().filter(|v| *v != 0.0)?;
    let used = info.memory_used().filter(|v| *v != 0.0)?;
    Some(ReadingValue::Number(round1(used / total * 100.0)))
}

fn disk_free_gb(info: &PlayerInfo) -> Option<ReadingValue> {
    info.disk_free_gb().map(|v| ReadingValue::Number(round1(v)))
}

fn uptime_hours(info: &PlayerInfo) -> Option<ReadingValue> {
    let days = info.uptime_days().unwrap_or(0.0);
    let hours = info.uptime_hours().unwrap_or(0.0);
    Some(ReadingValue::Number(round1(days * 24.0 + hours)))
}

fn ip_address(info: &PlayerInfo) -> Option<ReadingValue> {
    let first = info.ip_addresses().into_iter().next()?;
    let stripped = first
        .strip_prefix("http://")
        .or_else(|| first.strip_prefix("https://"))
        .unwrap_or(&first);
    Some(ReadingValue::Text(stripped.trim_end_matches('/').to_string()))
}

fn mac_address(info: &PlayerInfo) -> Option<ReadingValue> {
    info.mac_address().map(|v| ReadingValue::Text(v.to_string()))
}

fn active_schedule_slot(player: &PlayerSnapshot) -> Option<ReadingValue> {
    let active = player.schedule_status.active_slot.as_ref()?;
    let name = active.name.clone().unwrap_or_else(|| "Unknown".to_string());
    Some(ReadingValue::Text(name))
}

fn active_slot_attributes(player: &PlayerSnapshot) -> Map<String, Value> {
    let active = player.schedule_status.active_slot.as_ref();
    let slot_names: Vec<&str> = player
        .schedule_slots
        .iter()
        .map(|s| s.name.as_deref().unwrap_or(""))
        .collect();
    let slot_types: Vec<&str> = player
        .schedule_slots
        .iter()
        .map(|s| s.slot_type.as_deref().unwrap_or(""))
        .collect();

    let mut attributes = Map::new();
    attributes.insert("slot_names".into(), json!(slot_names));
    attributes.insert("slot_types".into(), json!(slot_types));
    attributes.insert("active_slot_id".into(), json!(active.and_then(|s| s.id.as_deref())));
    attributes.insert(
        "active_slot_type".into(),
        json!(active.and_then(|s| s.slot_type.as_deref())),
    );
    attributes
}

fn schedule_slot_count(player: &PlayerSnapshot) -> Option<ReadingValue> {
    Some(ReadingValue::Count(player.schedule_slots.len() as u64))
}

// ============================================================================
// Materialization
// ============================================================================

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reading is available iff the last refresh succeeded and the player is online
pub fn reading_available(player: &PlayerSnapshot, last_update_success: bool) -> bool {
    last_update_success && player.is_online
}

/// All readings for one player
pub fn player_readings(player: &PlayerSnapshot, last_update_success: bool) -> Vec<Reading> {
    let available = reading_available(player, last_update_success);

    let info_readings = INFO_METRICS.iter().map(|metric| Reading {
        unique_id: format!("{}_{}", player.id, metric.key),
        player_id: player.id.clone(),
        key: metric.key,
        name: format!("{} {}", player.name, title_case(metric.key)),
        unit: metric.unit,
        icon: metric.icon,
        value: (metric.value)(&player.info),
        available,
        attributes: Map::new(),
    });

    let schedule_readings = SCHEDULE_METRICS.iter().map(|metric| Reading {
        unique_id: format!("{}_{}", player.id, metric.key),
        player_id: player.id.clone(),
        key: metric.key,
        name: format!("{} {}", player.name, title_case(metric.key)),
        unit: None,
        icon: metric.icon,
        value: (metric.value)(player),
        available,
        attributes: metric.attributes.map(|f| f(player)).unwrap_or_default(),
    });

    info_readings.chain(schedule_readings).collect()
}

/// All readings for the fleet, ordered by player id
pub fn fleet_readings(snapshot: &FleetSnapshot, last_update_success: bool) -> Vec<Reading> {
    let mut players: Vec<&PlayerSnapshot> = snapshot.players().collect();
    players.sort_by(|a, b| a.id.cmp(&b.id));
    players
        .into_iter()
        .flat_map(|player| player_readings(player, last_update_success))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
