use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;

use anthias_fleet::actions::FleetCommand;
use anthias_fleet::client::{AssetUpload, FleetClient};
use anthias_fleet::config::Config;

use super::connect;

#[derive(Subcommand, Debug)]
pub enum PlayerAction {
    /// Reboot the player
    Reboot,
    /// Shut the player down
    Shutdown,
    /// Turn the TV on over HDMI-CEC
    Wake,
    /// Put the TV in standby over HDMI-CEC
    Standby,
    /// Skip to the next asset
    Next,
    /// Go back to the previous asset
    Previous,
    /// Print the screenshot URL
    Screenshot,
    /// Ask whether a software update is available
    CheckUpdate,
    /// Start a software update
    Update,
    /// Add a URL asset
    AddAsset {
        name: String,
        uri: String,
        /// Seconds on screen
        #[arg(short, long)]
        duration: Option<u32>,
        /// webpage, image or video
        #[arg(short, long)]
        mimetype: Option<String>,
    },
    /// Upload a file as an asset
    Upload {
        file: PathBuf,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        duration: Option<u32>,
    },
    /// Delete an asset
    DeleteAsset { asset_id: String },
    /// Enable an asset
    EnableAsset { asset_id: String },
    /// Disable an asset
    DisableAsset { asset_id: String },
    /// Create a schedule slot
    AddSlot {
        name: String,
        /// default, time or event
        #[arg(long)]
        slot_type: Option<String>,
        #[arg(long)]
        start_time: Option<String>,
        #[arg(long)]
        end_time: Option<String>,
        /// Day numbers, e.g. "1,2,3"
        #[arg(long)]
        days: Option<String>,
    },
    /// Delete a schedule slot
    DeleteSlot { slot_id: String },
    /// Add an asset to a schedule slot
    AddSlotItem { slot_id: String, asset_id: String },
    /// Remove an item from a schedule slot
    RemoveSlotItem { slot_id: String, item_id: String },
}

impl PlayerAction {
    /// The command this action sends, or `None` for the actions that are
    /// not player commands
    fn into_command(self, player_id: String) -> Option<FleetCommand> {
        let command = match self {
            Self::Reboot => FleetCommand::Reboot { player_id },
            Self::Shutdown => FleetCommand::Shutdown { player_id },
            Self::Wake => FleetCommand::CecWake { player_id },
            Self::Standby => FleetCommand::CecStandby { player_id },
            Self::Next => FleetCommand::PlaybackNext { player_id },
            Self::Previous => FleetCommand::PlaybackPrevious { player_id },
            Self::Update => FleetCommand::TriggerUpdate { player_id },
            Self::AddAsset {
                name,
                uri,
                duration,
                mimetype,
            } => FleetCommand::CreateAsset {
                player_id,
                name,
                uri,
                duration,
                mimetype,
            },
            Self::DeleteAsset { asset_id } => FleetCommand::DeleteAsset { player_id, asset_id },
            Self::EnableAsset { asset_id } => FleetCommand::ToggleAsset {
                player_id,
                asset_id,
                is_enabled: Some(true),
            },
            Self::DisableAsset { asset_id } => FleetCommand::ToggleAsset {
                player_id,
                asset_id,
                is_enabled: Some(false),
            },
            Self::AddSlot {
                name,
                slot_type,
                start_time,
                end_time,
                days,
            } => FleetCommand::CreateScheduleSlot {
                player_id,
                name,
                slot_type,
                start_time,
                end_time,
                days_of_week: days,
            },
            Self::DeleteSlot { slot_id } => FleetCommand::DeleteScheduleSlot { player_id, slot_id },
            Self::AddSlotItem { slot_id, asset_id } => FleetCommand::AddSlotItem {
                player_id,
                slot_id,
                asset_id,
            },
            Self::RemoveSlotItem { slot_id, item_id } => FleetCommand::RemoveSlotItem {
                player_id,
                slot_id,
                item_id,
            },
            Self::Screenshot | Self::CheckUpdate | Self::Upload { .. } => return None,
        };
        Some(command)
    }
}

pub async fn player(config: &Config, player_id: String, action: PlayerAction) -> Result<()> {
    let handle = connect(config)?;
    let client = &handle.client;

    let response = match action {
        PlayerAction::Screenshot => {
            println!("{}", client.screenshot_url(&player_id));
            return Ok(());
        }
        PlayerAction::CheckUpdate => client
            .check_update(&player_id)
            .await
            .context("Update check failed")?,
        PlayerAction::Upload {
            file,
            name,
            duration,
        } => {
            let upload = read_upload(&file, name, duration)?;
            client
                .upload_asset(&player_id, upload)
                .await
                .with_context(|| format!("Upload of {} failed", file.display()))?
        }
        action => {
            let Some(command) = action.into_command(player_id) else {
                anyhow::bail!("Action is not a player command");
            };
            send(&handle.client, &command).await?
        }
    };

    print_response(&response)
}

pub async fn deploy(config: &Config, player_id: String, media_file_id: String) -> Result<()> {
    let handle = connect(config)?;
    let command = FleetCommand::DeployContent {
        player_id,
        media_file_id,
    };
    let response = send(&handle.client, &command).await?;
    print_response(&response)
}

async fn send(client: &FleetClient, command: &FleetCommand) -> Result<Value> {
    let response = command
        .execute(client)
        .await
        .with_context(|| format!("{} failed for player {}", command.name(), command.player_id()))?;
    tracing::info!(command = command.name(), player_id = command.player_id(), "Command sent");
    Ok(response)
}

fn print_response(response: &Value) -> Result<()> {
    if !response.is_null() {
        println!("{}", serde_json::to_string_pretty(response)?);
    }
    Ok(())
}

fn read_upload(path: &Path, name: Option<String>, duration: Option<u32>) -> Result<AssetUpload> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Upload path has no file name")?
        .to_string();

    Ok(AssetUpload {
        content_type: content_type_for(path).map(str::to_string),
        file_name,
        content,
        name,
        duration,
    })
}

fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_to_command() {
        let command = PlayerAction::DisableAsset {
            asset_id: "a1".into(),
        }
        .into_command("p1".into())
        .unwrap();
        assert_eq!(
            command,
            FleetCommand::ToggleAsset {
                player_id: "p1".into(),
                asset_id: "a1".into(),
                is_enabled: Some(false),
            }
        );

        assert!(PlayerAction::Screenshot.into_command("p1".into()).is_none());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("clip.MP4")), Some("video/mp4"));
        assert_eq!(content_type_for(Path::new("logo.png")), Some("image/png"));
        assert_eq!(content_type_for(Path::new("notes.txt")), None);
        assert_eq!(content_type_for(Path::new("noext")), None);
    }
}
