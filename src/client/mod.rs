//! Fleet Manager REST client
//!
//! Authenticated JSON calls against the Fleet Manager API. Every call is a
//! single request bounded by the configured timeout; status codes are
//! mapped onto [`ApiError`] so callers only ever see the two error kinds.
//!
//! # Example
//!
//! ```rust,ignore
//! use anthias_fleet::client::{ClientConfig, FleetClient};
//!
//! let client = FleetClient::new(ClientConfig::new("https://fm.example.com", token))?;
//! let players = client.get_players().await?;
//! client.reboot(&players[0].id).await?;
//! ```

pub mod error;
pub mod source;

use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{
    AssetUpdate, CecStatus, DeployRequest, MediaFile, NewAsset, NewScheduleSlot, NowPlaying,
    PlaybackAction, PlayerInfo, PlayerRecord, ScheduleSlot, ScheduleStatus,
};

pub use error::{ApiError, ApiResult, CommunicationError};
pub use source::FleetSource;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for the token exchange
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept in a [`CommunicationError::Status`]
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the Fleet Manager client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fleet Manager base URL (trailing slash is ignored)
    pub base_url: String,

    /// API token sent as `Authorization: Token <token>`
    pub token: String,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client config
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("anthias-fleet/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// File sent to `asset-upload`
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
    pub name: Option<String>,
    pub duration: Option<u32>,
}

// ============================================================================
// Fleet Client
// ============================================================================

/// Client for the Fleet Manager REST API
pub struct FleetClient {
    base_url: String,
    http_client: Client,
    token: RwLock<String>,
}

impl FleetClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| ApiError::Communication(CommunicationError::transport(e)))?;

        Ok(Self {
            base_url,
            http_client,
            token: RwLock::new(config.token),
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the API token (after re-authorization)
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
        tracing::info!("Fleet Manager token replaced");
    }

    /// Exchange a username/password for a long-lived API token
    ///
    /// This call is not authenticated. A 400 response carries the reason in
    /// `non_field_errors`; it surfaces as [`ApiError::Authentication`].
    pub async fn obtain_token(base_url: &str, username: &str, password: &str) -> ApiResult<String> {
        Self::obtain_token_with_timeout(base_url, username, password, DEFAULT_TOKEN_TIMEOUT).await
    }

    /// Token exchange with an explicit timeout
    pub async fn obtain_token_with_timeout(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> ApiResult<String> {
        let url = format!("{}/api/auth/token/", normalize_base_url(base_url)?);

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Communication(CommunicationError::transport(e)))?;

        let response = http_client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 400 {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("non_field_errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(Value::as_str)
                .unwrap_or("Invalid credentials");
            return Err(ApiError::Authentication {
                message: message.to_string(),
                status: Some(400),
            });
        }

        let body = read_json(response).await?;
        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::decode("token missing from response"))
    }

    // ------------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------------

    /// All players; paginated and bare-list responses look the same to callers
    pub async fn get_players(&self) -> ApiResult<Vec<PlayerRecord>> {
        self.get_list("/api/players/").await
    }

    /// Live resource metrics for one player
    pub async fn get_player_info(&self, player_id: &str) -> ApiResult<PlayerInfo> {
        self.get_json(&player_path(player_id, "info")).await
    }

    /// CEC availability and TV power state
    pub async fn get_cec_status(&self, player_id: &str) -> ApiResult<CecStatus> {
        self.get_json(&player_path(player_id, "cec-status")).await
    }

    /// Asset on screen, `None` when nothing is playing
    pub async fn get_now_playing(&self, player_id: &str) -> ApiResult<Option<NowPlaying>> {
        let value = self.request(Method::GET, &player_path(player_id, "now-playing"), None::<&Value>).await?;
        Ok(NowPlaying::from_payload(value)?)
    }

    pub async fn get_schedule_slots(&self, player_id: &str) -> ApiResult<Vec<ScheduleSlot>> {
        self.get_list(&player_path(player_id, "schedule-slots")).await
    }

    pub async fn get_schedule_status(&self, player_id: &str) -> ApiResult<ScheduleStatus> {
        self.get_json(&player_path(player_id, "schedule-status")).await
    }

    /// Update availability for a player
    pub async fn check_update(&self, player_id: &str) -> ApiResult<Value> {
        self.get_json(&player_path(player_id, "update")).await
    }

    /// URL of the player's live screenshot; no network call is made
    pub fn screenshot_url(&self, player_id: &str) -> String {
        format!("{}{}", self.base_url, player_path(player_id, "screenshot"))
    }

    // ------------------------------------------------------------------------
    // Player actions
    // ------------------------------------------------------------------------

    /// Wake TV via HDMI-CEC
    pub async fn cec_wake(&self, player_id: &str) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "cec-wake"), None::<&Value>).await
    }

    /// Send TV to standby via HDMI-CEC
    pub async fn cec_standby(&self, player_id: &str) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "cec-standby"), None::<&Value>).await
    }

    pub async fn reboot(&self, player_id: &str) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "reboot"), None::<&Value>).await
    }

    pub async fn shutdown(&self, player_id: &str) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "shutdown"), None::<&Value>).await
    }

    /// Skip to the next or previous asset
    pub async fn playback_control(&self, player_id: &str, action: PlaybackAction) -> ApiResult<Value> {
        let body = json!({ "action": action.as_str() });
        self.post_json(&player_path(player_id, "playback-control"), Some(&body)).await
    }

    /// Ask the player to install an available update
    pub async fn trigger_update(&self, player_id: &str) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "update"), None::<&Value>).await
    }

    // ------------------------------------------------------------------------
    // Assets
    // ------------------------------------------------------------------------

    pub async fn create_asset(&self, player_id: &str, asset: &NewAsset) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "asset-create"), Some(asset)).await
    }

    /// Upload a file as a new asset (multipart)
    pub async fn upload_asset(&self, player_id: &str, upload: AssetUpload) -> ApiResult<Value> {
        let mut part = reqwest::multipart::Part::bytes(upload.content).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ApiError::Communication(CommunicationError::transport(e)))?;
        }

        let mut form = reqwest::multipart::Form::new().part("file", part);
        form = form.text("name", upload.name.unwrap_or(upload.file_name));
        if let Some(duration) = upload.duration {
            form = form.text("duration", duration.to_string());
        }

        let url = self.url(&player_path(player_id, "asset-upload"));
        self.execute(self.http_client.post(url).multipart(form)).await
    }

    pub async fn delete_asset(&self, player_id: &str, asset_id: &str) -> ApiResult<Value> {
        let body = json!({ "asset_id": asset_id });
        self.post_json(&player_path(player_id, "asset-delete"), Some(&body)).await
    }

    /// Patch asset fields (e.g. enable/disable)
    pub async fn update_asset(&self, player_id: &str, update: &AssetUpdate) -> ApiResult<Value> {
        self.patch_json(&player_path(player_id, "asset-update"), update).await
    }

    // ------------------------------------------------------------------------
    // Schedule
    // ------------------------------------------------------------------------

    pub async fn create_schedule_slot(&self, player_id: &str, slot: &NewScheduleSlot) -> ApiResult<Value> {
        self.post_json(&player_path(player_id, "schedule-slot-create"), Some(slot)).await
    }

    /// Patch an existing slot; `fields` must include `slot_id`
    pub async fn update_schedule_slot(&self, player_id: &str, fields: &Value) -> ApiResult<Value> {
        self.patch_json(&player_path(player_id, "schedule-slot-update"), fields).await
    }

    pub async fn delete_schedule_slot(&self, player_id: &str, slot_id: &str) -> ApiResult<Value> {
        let body = json!({ "slot_id": slot_id });
        self.post_json(&player_path(player_id, "schedule-slot-delete"), Some(&body)).await
    }

    pub async fn add_slot_item(&self, player_id: &str, slot_id: &str, asset_id: &str) -> ApiResult<Value> {
        let body = json!({ "slot_id": slot_id, "asset_id": asset_id });
        self.post_json(&player_path(player_id, "schedule-slot-item-add"), Some(&body)).await
    }

    pub async fn remove_slot_item(&self, player_id: &str, slot_id: &str, item_id: &str) -> ApiResult<Value> {
        let body = json!({ "slot_id": slot_id, "item_id": item_id });
        self.post_json(&player_path(player_id, "schedule-slot-item-remove"), Some(&body)).await
    }

    // ------------------------------------------------------------------------
    // Media library and deploys
    // ------------------------------------------------------------------------

    pub async fn get_media_files(&self) -> ApiResult<Vec<MediaFile>> {
        self.get_list("/api/media/").await
    }

    /// Push a media-library file to a player
    pub async fn deploy_content(&self, request: &DeployRequest) -> ApiResult<Value> {
        self.post_json("/api/deploy/", Some(request)).await
    }

    // ------------------------------------------------------------------------
    // Internal request plumbing
    // ------------------------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let value = self.request(Method::GET, path, None::<&Value>).await?;
        Ok(serde_json::from_value(value)?)
    }

    // Lists may come back bare or wrapped in a `{"results": [...]}` page
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let value = self.request(Method::GET, path, None::<&Value>).await?;
        let items = unwrap_results(value)?;
        Ok(serde_json::from_value(items)?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: Option<&B>) -> ApiResult<Value> {
        self.request(Method::POST, path, body).await
    }

    async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<Value> {
        let mut builder = self.http_client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::trace!(%method, path, "Fleet Manager request");
        self.execute(builder).await
    }

    async fn execute(&self, builder: RequestBuilder) -> ApiResult<Value> {
        let response = builder.header(AUTHORIZATION, self.auth_header()?).send().await?;
        read_json(response).await
    }

    fn auth_header(&self) -> ApiResult<HeaderValue> {
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|_| ApiError::auth("Token contains invalid header characters"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl std::fmt::Debug for FleetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn player_path(player_id: &str, resource: &str) -> String {
    format!("/api/players/{player_id}/{resource}/")
}

fn normalize_base_url(base_url: &str) -> ApiResult<String> {
    let trimmed = base_url.trim().trim_end_matches('/');
    url::Url::parse(trimmed)
        .map_err(|e| CommunicationError::InvalidUrl(format!("{trimmed}: {e}")))?;
    Ok(trimmed.to_string())
}

/// Strip a paginated envelope, leaving a bare list
pub(crate) fn unwrap_results(value: Value) -> ApiResult<Value> {
    match value {
        Value::Array(_) => Ok(value),
        Value::Object(mut map) if map.contains_key("results") => {
            let results = map.remove("results").unwrap_or(Value::Null);
            if results.is_array() {
                Ok(results)
            } else {
                Err(ApiError::decode("`results` is not a list"))
            }
        }
        Value::Null => Ok(Value::Array(Vec::new())),
        _ => Err(ApiError::decode("expected a list or a paginated response")),
    }
}

async fn read_json(response: Response) -> ApiResult<Value> {
    let status = response.status();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(ApiError::auth_status(status.as_u16()));
    }

    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(CommunicationError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_creation() {
        let config = ClientConfig::new("http://localhost:8000", "abc");

        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.token, "abc");
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_client_config_with_timeout() {
        let config = ClientConfig::new("http://localhost:8000", "abc")
            .with_timeout(Duration::from_secs(30))
            .with_user_agent("test-agent");

        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = FleetClient::new(ClientConfig::new("http://fm.local:8000/", "abc")).unwrap();
        assert_eq!(client.base_url(), "http://fm.local:8000");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = FleetClient::new(ClientConfig::new("not a url", "abc"));
        assert!(matches!(
            result,
            Err(ApiError::Communication(CommunicationError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn test_screenshot_url() {
        let client = FleetClient::new(ClientConfig::new("http://fm.local/", "abc")).unwrap();
        assert_eq!(
            client.screenshot_url("p1"),
            "http://fm.local/api/players/p1/screenshot/"
        );
    }

    #[test]
    fn test_unwrap_results_variants() {
        let bare = json!([{"id": 1}]);
        let paged = json!({"count": 1, "next": null, "results": [{"id": 1}]});

        assert_eq!(unwrap_results(bare.clone()).unwrap(), bare);
        assert_eq!(unwrap_results(paged).unwrap(), bare);
        assert_eq!(unwrap_results(Value::Null).unwrap(), json!([]));
        assert!(unwrap_results(json!({"detail": "nope"})).is_err());
        assert!(unwrap_results(json!({"results": "x"})).is_err());
    }

    #[test]
    fn test_set_token_replaces_header() {
        let client = FleetClient::new(ClientConfig::new("http://fm.local", "old")).unwrap();
        client.set_token("new");

        let header = client.auth_header().unwrap();
        assert_eq!(header.to_str().unwrap(), "Token new");
    }
}
