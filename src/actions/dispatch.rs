//! Command dispatch and the fleet registry
//!
//! Dispatch always goes through an explicit [`FleetHandle`]. With several
//! fleets configured, callers name the fleet; there is no implicit default.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::{ActionError, FleetCommand};
use crate::cache::MediaLibraryCache;
use crate::client::{ApiResult, ClientConfig, FleetClient};
use crate::poller::{FleetPoller, PollerConfig};

// ============================================================================
// Fleet Handle
// ============================================================================

/// Everything needed to observe and control one Fleet Manager
#[derive(Clone)]
pub struct FleetHandle {
    pub name: String,
    pub client: Arc<FleetClient>,
    pub poller: FleetPoller<FleetClient>,
    pub media: Arc<MediaLibraryCache<FleetClient>>,
}

impl FleetHandle {
    /// Wire a client, poller and media cache together. Nothing is fetched yet.
    pub fn connect(
        name: impl Into<String>,
        client_config: ClientConfig,
        poller_config: PollerConfig,
        media_ttl: Duration,
    ) -> ApiResult<Self> {
        let client = Arc::new(FleetClient::new(client_config)?);
        Ok(Self::from_client(name, client, poller_config, media_ttl))
    }

    pub fn from_client(
        name: impl Into<String>,
        client: Arc<FleetClient>,
        poller_config: PollerConfig,
        media_ttl: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            poller: FleetPoller::new(client.clone(), poller_config),
            media: Arc::new(MediaLibraryCache::with_ttl(client.clone(), media_ttl)),
            client,
        }
    }

    pub fn dispatcher(&self) -> ActionDispatcher {
        ActionDispatcher::new(self.client.clone(), self.poller.clone())
    }
}

impl std::fmt::Debug for FleetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetHandle")
            .field("name", &self.name)
            .field("base_url", &self.client.base_url())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Action Dispatcher
// ============================================================================

/// Sends commands and asks for a refresh afterwards
#[derive(Clone)]
pub struct ActionDispatcher {
    client: Arc<FleetClient>,
    poller: FleetPoller<FleetClient>,
}

impl ActionDispatcher {
    pub fn new(client: Arc<FleetClient>, poller: FleetPoller<FleetClient>) -> Self {
        Self { client, poller }
    }

    /// Execute a command
    ///
    /// Once a request was attempted, a refresh is requested whether it
    /// succeeded or not, so a stale snapshot corrects itself. The command
    /// result is returned unchanged.
    pub async fn dispatch(&self, command: &FleetCommand) -> Result<Value, ActionError> {
        command.validate()?;

        let result = command.execute(&self.client).await;
        match &result {
            Ok(_) => tracing::info!(
                command = command.name(),
                player_id = command.player_id(),
                "Command sent"
            ),
            Err(e) => tracing::warn!(
                command = command.name(),
                player_id = command.player_id(),
                error = %e,
                "Command failed"
            ),
        }

        if let Err(e) = self.poller.request_refresh() {
            tracing::debug!(error = %e, "Refresh after command not scheduled");
        }

        result
    }
}

// ============================================================================
// Fleet Registry
// ============================================================================

/// Named fleets; lookups must name the fleet
#[derive(Debug, Default)]
pub struct FleetRegistry {
    fleets: BTreeMap<String, FleetHandle>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fleet, returning the handle it replaced
    pub fn register(&mut self, handle: FleetHandle) -> Option<FleetHandle> {
        self.fleets.insert(handle.name.clone(), handle)
    }

    pub fn remove(&mut self, name: &str) -> Option<FleetHandle> {
        self.fleets.remove(name)
    }

    pub fn get(&self, name: &str) -> Result<&FleetHandle, ActionError> {
        self.fleets
            .get(name)
            .ok_or_else(|| ActionError::UnknownFleet(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fleets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fleets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fleets.is_empty()
    }

    /// Dispatch a command to the named fleet
    pub async fn dispatch(&self, fleet: &str, command: &FleetCommand) -> Result<Value, ActionError> {
        self.get(fleet)?.dispatcher().dispatch(command).await
    }

    /// Stop every fleet's poller
    pub async fn stop_all(&self) {
        for handle in self.fleets.values() {
            handle.poller.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_MEDIA_TTL;

    fn handle(name: &str) -> FleetHandle {
        FleetHandle::connect(
            name,
            ClientConfig::new("http://127.0.0.1:9", "token"),
            PollerConfig::default(),
            DEFAULT_MEDIA_TTL,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_registry_requires_name() {
        let mut registry = FleetRegistry::new();
        registry.register(handle("lobby"));
        registry.register(handle("warehouse"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("lobby").unwrap().name, "lobby");
        assert!(matches!(
            registry.get("missing"),
            Err(ActionError::UnknownFleet(name)) if name == "missing"
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lobby", "warehouse"]);
    }

    #[tokio::test]
    async fn test_dispatch_to_unknown_fleet() {
        let registry = FleetRegistry::new();
        let command = FleetCommand::Reboot {
            player_id: "p1".into(),
        };

        let err = registry.dispatch("lobby", &command).await.unwrap_err();
        assert!(matches!(err, ActionError::UnknownFleet(_)));
    }

    #[tokio::test]
    async fn test_invalid_command_is_not_sent() {
        let handle = handle("lobby");
        let command = FleetCommand::DeleteAsset {
            player_id: "p1".into(),
            asset_id: String::new(),
        };

        let err = handle.dispatcher().dispatch(&command).await.unwrap_err();
        assert!(matches!(err, ActionError::Invalid { field: "asset_id", .. }));
    }
}
