//! Per-field fetch outcomes and cycle statistics

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::client::ApiError;

/// Live fields filled by per-player sub-fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    Info,
    Cec,
    NowPlaying,
    ScheduleSlots,
    ScheduleStatus,
}

impl SnapshotField {
    pub const ALL: [SnapshotField; 5] = [
        Self::Info,
        Self::Cec,
        Self::NowPlaying,
        Self::ScheduleSlots,
        Self::ScheduleStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Cec => "cec",
            Self::NowPlaying => "now_playing",
            Self::ScheduleSlots => "schedule_slots",
            Self::ScheduleStatus => "schedule_status",
        }
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sub-fetch
///
/// `Unavailable` leaves the field at its seeded default. The reason is kept
/// for logs and stats only; the snapshot itself does not carry it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome<T> {
    Fetched(T),
    Unavailable { reason: String },
}

impl<T> FieldOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Fetched(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Overwrite `slot` only when the fetch succeeded
    pub fn apply_to(self, slot: &mut T) {
        if let Self::Fetched(value) = self {
            *slot = value;
        }
    }
}

/// A sub-fetch that did not produce a value
#[derive(Debug)]
pub struct FieldFailure {
    pub player_id: String,
    pub field: SnapshotField,
    pub error: ApiError,
}

/// Counters for one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleStats {
    /// Players returned by the list call
    pub players: usize,
    /// Players whose sub-fetches were attempted
    pub online: usize,
    /// Failed sub-fetches by field
    pub field_failures: BTreeMap<SnapshotField, usize>,
    /// Sub-fetch authentication failures that were absorbed
    pub auth_failures: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl CycleStats {
    pub fn failures(&self, field: SnapshotField) -> usize {
        self.field_failures.get(&field).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.field_failures.values().sum()
    }

    pub(crate) fn record(&mut self, failure: &FieldFailure) {
        *self.field_failures.entry(failure.field).or_insert(0) += 1;
        if failure.error.is_auth() {
            self.auth_failures += 1;
        }
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
