//! Player commands
//!
//! A [`FleetCommand`] is one control action against one player. Commands
//! are validated before any request is sent, executed straight through
//! the [`FleetClient`], and never touch the published snapshot; the
//! dispatcher asks the poller for a refresh afterwards instead.

pub mod dispatch;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::client::{ApiError, FleetClient};
use crate::models::{AssetMimetype, AssetUpdate, DeployRequest, NewAsset, NewScheduleSlot, PlaybackAction, SlotType};

pub use dispatch::{ActionDispatcher, FleetHandle, FleetRegistry};

/// Asset duration when none is given (seconds)
pub const DEFAULT_ASSET_DURATION: u32 = 10;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ActionError {
    /// Command arguments rejected before sending
    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// No fleet registered under this name
    #[error("Unknown fleet: {0}")]
    UnknownFleet(String),

    /// Fleet Manager call failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ActionError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// One control action, addressed to a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum FleetCommand {
    Reboot {
        player_id: String,
    },
    Shutdown {
        player_id: String,
    },
    CecWake {
        player_id: String,
    },
    CecStandby {
        player_id: String,
    },
    PlaybackNext {
        player_id: String,
    },
    PlaybackPrevious {
        player_id: String,
    },
    CreateAsset {
        player_id: String,
        name: String,
        uri: String,
        #[serde(default)]
        duration: Option<u32>,
        #[serde(default)]
        mimetype: Option<String>,
    },
    DeleteAsset {
        player_id: String,
        asset_id: String,
    },
    ToggleAsset {
        player_id: String,
        asset_id: String,
        #[serde(default)]
        is_enabled: Option<bool>,
    },
    CreateScheduleSlot {
        player_id: String,
        name: String,
        #[serde(default)]
        slot_type: Option<String>,
        #[serde(default)]
        start_time: Option<String>,
        #[serde(default)]
        end_time: Option<String>,
        /// Comma separated day numbers, e.g. "1,2,3"
        #[serde(default)]
        days_of_week: Option<String>,
    },
    DeleteScheduleSlot {
        player_id: String,
        slot_id: String,
    },
    AddSlotItem {
        player_id: String,
        slot_id: String,
        asset_id: String,
    },
    RemoveSlotItem {
        player_id: String,
        slot_id: String,
        item_id: String,
    },
    DeployContent {
        player_id: String,
        media_file_id: String,
    },
    TriggerUpdate {
        player_id: String,
    },
}

/// Request body built from a validated command
#[derive(Debug, Clone, PartialEq)]
enum Prepared {
    Plain,
    Playback(PlaybackAction),
    Asset(NewAsset),
    AssetUpdate(AssetUpdate),
    Slot(NewScheduleSlot),
    Deploy(DeployRequest),
}

impl FleetCommand {
    pub fn player_id(&self) -> &str {
        match self {
            Self::Reboot { player_id }
            | Self::Shutdown { player_id }
            | Self::CecWake { player_id }
            | Self::CecStandby { player_id }
            | Self::PlaybackNext { player_id }
            | Self::PlaybackPrevious { player_id }
            | Self::CreateAsset { player_id, .. }
            | Self::DeleteAsset { player_id, .. }
            | Self::ToggleAsset { player_id, .. }
            | Self::CreateScheduleSlot { player_id, .. }
            | Self::DeleteScheduleSlot { player_id, .. }
            | Self::AddSlotItem { player_id, .. }
            | Self::RemoveSlotItem { player_id, .. }
            | Self::DeployContent { player_id, .. }
            | Self::TriggerUpdate { player_id } => player_id,
        }
    }

    /// Command name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reboot { .. } => "reboot",
            Self::Shutdown { .. } => "shutdown",
            Self::CecWake { .. } => "cec_wake",
            Self::CecStandby { .. } => "cec_standby",
            Self::PlaybackNext { .. } => "playback_next",
            Self::PlaybackPrevious { .. } => "playback_previous",
            Self::CreateAsset { .. } => "create_asset",
            Self::DeleteAsset { .. } => "delete_asset",
            Self::ToggleAsset { .. } => "toggle_asset",
            Self::CreateScheduleSlot { .. } => "create_schedule_slot",
            Self::DeleteScheduleSlot { .. } => "delete_schedule_slot",
            Self::AddSlotItem { .. } => "add_slot_item",
            Self::RemoveSlotItem { .. } => "remove_slot_item",
            Self::DeployContent { .. } => "deploy_content",
            Self::TriggerUpdate { .. } => "trigger_update",
        }
    }

    /// Check arguments without sending anything
    pub fn validate(&self) -> Result<(), ActionError> {
        self.prepare().map(|_| ())
    }

    fn prepare(&self) -> Result<Prepared, ActionError> {
        if self.player_id().trim().is_empty() {
            return Err(ActionError::invalid("player_id", "must not be empty"));
        }

        let prepared = match self {
            Self::PlaybackNext { .. } => Prepared::Playback(PlaybackAction::Next),
            Self::PlaybackPrevious { .. } => Prepared::Playback(PlaybackAction::Previous),
            Self::CreateAsset {
                name,
                uri,
                duration,
                mimetype,
                ..
            } => {
                require("name", name)?;
                require("uri", uri)?;
                let mimetype = match mimetype.as_deref() {
                    None => AssetMimetype::default(),
                    Some(s) => AssetMimetype::parse(s).ok_or_else(|| {
                        ActionError::invalid("mimetype", format!("'{s}' is not one of webpage, image, video"))
                    })?,
                };
                Prepared::Asset(NewAsset {
                    name: name.clone(),
                    uri: uri.clone(),
                    duration: duration.unwrap_or(DEFAULT_ASSET_DURATION).to_string(),
                    mimetype,
                })
            }
            Self::DeleteAsset { asset_id, .. } => {
                require("asset_id", asset_id)?;
                Prepared::Plain
            }
            Self::ToggleAsset {
                asset_id,
                is_enabled,
                ..
            } => {
                require("asset_id", asset_id)?;
                Prepared::AssetUpdate(AssetUpdate {
                    asset_id: asset_id.clone(),
                    is_enabled: Some(is_enabled.unwrap_or(true)),
                    fields: Default::default(),
                })
            }
            Self::CreateScheduleSlot {
                name,
                slot_type,
                start_time,
                end_time,
                days_of_week,
                ..
            } => {
                require("name", name)?;
                let slot_type = match slot_type.as_deref() {
                    None => SlotType::default(),
                    Some(s) => SlotType::parse(s).ok_or_else(|| {
                        ActionError::invalid("slot_type", format!("'{s}' is not one of default, time, event"))
                    })?,
                };
                Prepared::Slot(NewScheduleSlot {
                    slot_type,
                    name: name.clone(),
                    start_time: start_time.clone(),
                    end_time: end_time.clone(),
                    days_of_week: days_of_week.as_deref().map(parse_days_of_week).transpose()?,
                })
            }
            Self::DeleteScheduleSlot { slot_id, .. } => {
                require("slot_id", slot_id)?;
                Prepared::Plain
            }
            Self::AddSlotItem { slot_id, asset_id, .. } => {
                require("slot_id", slot_id)?;
                require("asset_id", asset_id)?;
                Prepared::Plain
            }
            Self::RemoveSlotItem { slot_id, item_id, .. } => {
                require("slot_id", slot_id)?;
                require("item_id", item_id)?;
                Prepared::Plain
            }
            Self::DeployContent {
                player_id,
                media_file_id,
            } => {
                require("media_file_id", media_file_id)?;
                Prepared::Deploy(DeployRequest {
                    player_id: player_id.clone(),
                    media_file_id: media_file_id.clone(),
                })
            }
            Self::Reboot { .. }
            | Self::Shutdown { .. }
            | Self::CecWake { .. }
            | Self::CecStandby { .. }
            | Self::TriggerUpdate { .. } => Prepared::Plain,
        };

        Ok(prepared)
    }

    /// Validate and send the command; the decoded response body is returned unchanged
    pub async fn execute(&self, client: &FleetClient) -> Result<Value, ActionError> {
        let prepared = self.prepare()?;
        let id = self.player_id();

        let response = match (self, prepared) {
            (Self::Reboot { .. }, _) => client.reboot(id).await?,
            (Self::Shutdown { .. }, _) => client.shutdown(id).await?,
            (Self::CecWake { .. }, _) => client.cec_wake(id).await?,
            (Self::CecStandby { .. }, _) => client.cec_standby(id).await?,
            (_, Prepared::Playback(action)) => client.playback_control(id, action).await?,
            (_, Prepared::Asset(asset)) => client.create_asset(id, &asset).await?,
            (Self::DeleteAsset { asset_id, .. }, _) => client.delete_asset(id, asset_id).await?,
            (_, Prepared::AssetUpdate(update)) => client.update_asset(id, &update).await?,
            (_, Prepared::Slot(slot)) => client.create_schedule_slot(id, &slot).await?,
            (Self::DeleteScheduleSlot { slot_id, .. }, _) => {
                client.delete_schedule_slot(id, slot_id).await?
            }
            (Self::AddSlotItem { slot_id, asset_id, .. }, _) => {
                client.add_slot_item(id, slot_id, asset_id).await?
            }
            (Self::RemoveSlotItem { slot_id, item_id, .. }, _) => {
                client.remove_slot_item(id, slot_id, item_id).await?
            }
            (_, Prepared::Deploy(request)) => client.deploy_content(&request).await?,
            (Self::TriggerUpdate { .. }, _) => client.trigger_update(id).await?,
            (command, prepared) => {
                return Err(ActionError::invalid(
                    "command",
                    format!("{} cannot be sent as {prepared:?}", command.name()),
                ))
            }
        };

        Ok(response)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        Err(ActionError::invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Parse "1,2,3" into day numbers; blank entries are skipped
pub fn parse_days_of_week(text: &str) -> Result<Vec<u8>, ActionError> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u8>()
                .map_err(|_| ActionError::invalid("days_of_week", format!("'{part}' is not a day number")))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
