//! Derived per-player views: playback, display power, device identity

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::PlayerSnapshot;

pub const MANUFACTURER: &str = "Anthias";
pub const DEFAULT_MODEL: &str = "Anthias Player";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Off,
    Playing,
    Idle,
}

impl PlaybackState {
    pub fn of(player: &PlayerSnapshot) -> Self {
        if !player.is_online {
            Self::Off
        } else if player.now_playing.is_some() {
            Self::Playing
        } else {
            Self::Idle
        }
    }
}

/// Kind of the asset on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
    Url,
    /// Unrecognized mimetype, passed through
    Other(String),
}

impl MediaKind {
    pub fn from_mimetype(mimetype: &str) -> Self {
        match mimetype {
            "video" => Self::Video,
            "image" => Self::Image,
            "web" => Self::Url,
            other => Self::Other(other.to_string()),
        }
    }
}

/// TV power as seen through HDMI-CEC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayPower {
    /// Controllable only when the player is online and reports CEC
    pub available: bool,
    pub on: bool,
}

impl DisplayPower {
    pub fn of(player: &PlayerSnapshot, last_update_success: bool) -> Self {
        let cec_available = player.cec.as_ref().is_some_and(|c| c.cec_available);
        Self {
            available: last_update_success && player.is_online && cec_available,
            on: player.cec.as_ref().is_some_and(|c| c.tv_on),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
    pub sw_version: Option<String>,
}

impl DeviceDescriptor {
    pub fn of(player: &PlayerSnapshot) -> Self {
        Self {
            identifier: player.id.clone(),
            name: player.name.clone(),
            manufacturer: MANUFACTURER,
            model: player
                .info
                .device_model()
                .unwrap_or(DEFAULT_MODEL)
                .to_string(),
            sw_version: player.info.anthias_version().map(str::to_string),
        }
    }
}

/// Short hash that changes whenever the screenshot is likely to change
///
/// Derived from `last_seen` and the current asset; `None` for offline players.
pub fn image_hash(player: &PlayerSnapshot) -> Option<String> {
    if !player.is_online {
        return None;
    }

    let now_playing = player.now_playing.as_ref();
    let key = format!(
        "{}-{}-{}",
        player.last_seen.as_deref().unwrap_or(""),
        now_playing.and_then(|n| n.asset_id.as_deref()).unwrap_or(""),
        now_playing.and_then(|n| n.started_at.as_deref()).unwrap_or(""),
    );

    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    Some(digest[..8].to_string())
}

/// Everything a consumer needs to render one player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub online: bool,
    /// Online state is trustworthy only after a successful refresh
    pub online_available: bool,
    pub playback: PlaybackState,
    pub media_title: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub display_power: DisplayPower,
    pub device: DeviceDescriptor,
    pub image_hash: Option<String>,
}

impl PlayerView {
    pub fn of(player: &PlayerSnapshot, last_update_success: bool) -> Self {
        let now_playing = player.now_playing.as_ref();
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            online: player.is_online,
            online_available: last_update_success,
            playback: PlaybackState::of(player),
            media_title: now_playing.and_then(|n| n.asset_name.clone()),
            media_kind: now_playing
                .map(|n| MediaKind::from_mimetype(n.mimetype.as_deref().unwrap_or(""))),
            display_power: DisplayPower::of(player, last_update_success),
            device: DeviceDescriptor::of(player),
            image_hash: image_hash(player),
        }
    }
}
