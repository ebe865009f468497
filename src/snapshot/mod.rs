//! Snapshot builder
//!
//! One call to [`SnapshotBuilder::build`] is one refresh cycle: list every
//! player, fetch the live sub-resources of the online ones, and assemble a
//! fresh [`FleetSnapshot`]. Only the list call can fail the cycle; each
//! sub-fetch fails on its own and leaves its field at the seeded default.

pub mod outcome;

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::client::{ApiError, ApiResult, FleetSource};
use crate::models::{FleetSnapshot, PlayerRecord, PlayerSnapshot};

pub use outcome::{CycleStats, FieldFailure, FieldOutcome, SnapshotField};

/// Default number of players fetched in parallel
pub const DEFAULT_MAX_CONCURRENT_PLAYERS: usize = 4;

// ============================================================================
// Builder Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Players whose sub-fetches run at the same time
    pub max_concurrent_players: usize,

    /// Treat a sub-fetch authentication failure as a failed cycle
    pub abort_on_subfetch_auth_failure: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_players: DEFAULT_MAX_CONCURRENT_PLAYERS,
            abort_on_subfetch_auth_failure: false,
        }
    }
}

impl BuilderConfig {
    pub fn with_max_concurrent_players(mut self, n: usize) -> Self {
        self.max_concurrent_players = n.max(1);
        self
    }

    pub fn with_abort_on_subfetch_auth_failure(mut self, abort: bool) -> Self {
        self.abort_on_subfetch_auth_failure = abort;
        self
    }
}

/// A finished cycle
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub snapshot: FleetSnapshot,
    pub stats: CycleStats,
}

struct PlayerBuild {
    player: PlayerSnapshot,
    failures: Vec<FieldFailure>,
}

// ============================================================================
// Snapshot Builder
// ============================================================================

pub struct SnapshotBuilder<S> {
    source: Arc<S>,
    config: BuilderConfig,
}

impl<S: FleetSource> SnapshotBuilder<S> {
    pub fn new(source: Arc<S>, config: BuilderConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Run one refresh cycle
    ///
    /// Fails only when the player list cannot be fetched, or when a
    /// sub-fetch is rejected for credentials and the builder is configured
    /// to abort on that.
    pub async fn build(&self) -> ApiResult<BuildOutput> {
        let started = Instant::now();

        let records = self.source.list_players().await?;
        let mut stats = CycleStats {
            players: records.len(),
            online: records.iter().filter(|r| r.online()).count(),
            ..Default::default()
        };

        let builds: Vec<PlayerBuild> = stream::iter(records)
            .map(|record| self.build_player(record))
            .buffer_unordered(self.config.max_concurrent_players.max(1))
            .try_collect()
            .await?;

        let mut snapshot = FleetSnapshot::new();
        for build in builds {
            for failure in &build.failures {
                stats.record(failure);
            }
            snapshot.insert(build.player);
        }
        stats.duration = started.elapsed();

        tracing::debug!(
            players = stats.players,
            online = stats.online,
            failures = stats.total_failures(),
            duration_ms = stats.duration.as_millis() as u64,
            "Fleet snapshot built"
        );

        Ok(BuildOutput { snapshot, stats })
    }

    async fn build_player(&self, record: PlayerRecord) -> ApiResult<PlayerBuild> {
        let mut player = PlayerSnapshot::seed(&record);
        let mut failures = Vec::new();

        if !player.is_online {
            return Ok(PlayerBuild { player, failures });
        }

        let id = player.id.clone();
        let source = &self.source;
        let (info, cec, now_playing, slots, status) = tokio::join!(
            source.player_info(&id),
            source.cec_status(&id),
            source.now_playing(&id),
            source.schedule_slots(&id),
            source.schedule_status(&id),
        );

        let info = settle(&id, SnapshotField::Info, info, &mut failures);
        let cec = settle(&id, SnapshotField::Cec, cec, &mut failures);
        let now_playing = settle(&id, SnapshotField::NowPlaying, now_playing, &mut failures);
        let slots = settle(&id, SnapshotField::ScheduleSlots, slots, &mut failures);
        let status = settle(&id, SnapshotField::ScheduleStatus, status, &mut failures);

        if self.config.abort_on_subfetch_auth_failure {
            if let Some(pos) = failures.iter().position(|f| f.error.is_auth()) {
                let failure = failures.swap_remove(pos);
                tracing::warn!(player_id = %id, field = %failure.field, "Aborting cycle on sub-fetch authentication failure");
                return Err(failure.error);
            }
        }

        info.apply_to(&mut player.info);
        player.cec = cec.into_option();
        player.now_playing = now_playing.into_option().flatten();
        slots.apply_to(&mut player.schedule_slots);
        status.apply_to(&mut player.schedule_status);

        Ok(PlayerBuild { player, failures })
    }
}

/// Turn a sub-fetch result into an outcome, logging where it failed
fn settle<T>(
    player_id: &str,
    field: SnapshotField,
    result: ApiResult<T>,
    failures: &mut Vec<FieldFailure>,
) -> FieldOutcome<T> {
    match result {
        Ok(value) => FieldOutcome::Fetched(value),
        Err(error) => {
            let reason = error.to_string();
            match &error {
                ApiError::Authentication { .. } => {
                    tracing::warn!(player_id, %field, error = %reason, "Sub-fetch rejected credentials");
                }
                ApiError::Communication(_) => {
                    tracing::debug!(player_id, %field, error = %reason, "Sub-fetch failed");
                }
            }
            failures.push(FieldFailure {
                player_id: player_id.to_string(),
                field,
                error,
            });
            FieldOutcome::Unavailable { reason }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
