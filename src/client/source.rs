//! Read-side seam between the poller and the Fleet Manager
//!
//! The snapshot builder and media cache only need these reads, so they are
//! generic over [`FleetSource`] rather than tied to [`FleetClient`].

use async_trait::async_trait;

use super::{ApiResult, FleetClient};
use crate::models::{CecStatus, MediaFile, NowPlaying, PlayerInfo, PlayerRecord, ScheduleSlot, ScheduleStatus};

/// Read operations used by a poll cycle
#[async_trait]
pub trait FleetSource: Send + Sync {
    async fn list_players(&self) -> ApiResult<Vec<PlayerRecord>>;

    async fn player_info(&self, player_id: &str) -> ApiResult<PlayerInfo>;

    async fn cec_status(&self, player_id: &str) -> ApiResult<CecStatus>;

    async fn now_playing(&self, player_id: &str) -> ApiResult<Option<NowPlaying>>;

    async fn schedule_slots(&self, player_id: &str) -> ApiResult<Vec<ScheduleSlot>>;

    async fn schedule_status(&self, player_id: &str) -> ApiResult<ScheduleStatus>;

    async fn media_files(&self) -> ApiResult<Vec<MediaFile>>;
}

#[async_trait]
impl FleetSource for FleetClient {
    async fn list_players(&self) -> ApiResult<Vec<PlayerRecord>> {
        self.get_players().await
    }

    async fn player_info(&self, player_id: &str) -> ApiResult<PlayerInfo> {
        self.get_player_info(player_id).await
    }

    async fn cec_status(&self, player_id: &str) -> ApiResult<CecStatus> {
        self.get_cec_status(player_id).await
    }

    async fn now_playing(&self, player_id: &str) -> ApiResult<Option<NowPlaying>> {
        self.get_now_playing(player_id).await
    }

    async fn schedule_slots(&self, player_id: &str) -> ApiResult<Vec<ScheduleSlot>> {
        self.get_schedule_slots(player_id).await
    }

    async fn schedule_status(&self, player_id: &str) -> ApiResult<ScheduleStatus> {
        self.get_schedule_status(player_id).await
    }

    async fn media_files(&self) -> ApiResult<Vec<MediaFile>> {
        self.get_media_files().await
    }
}
