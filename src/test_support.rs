// Scriptable in-memory FleetSource for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{ApiError, ApiResult, CommunicationError, FleetSource};
use crate::models::{CecStatus, MediaFile, NowPlaying, PlayerInfo, PlayerRecord, ScheduleSlot, ScheduleStatus};

#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Timeout,
    Auth,
    Status(u16),
}

impl<T: Clone> Reply<T> {
    fn resolve(&self) -> ApiResult<T> {
        match self {
            Self::Ok(value) => Ok(value.clone()),
            Self::Timeout => Err(ApiError::Communication(CommunicationError::Timeout)),
            Self::Auth => Err(ApiError::auth_status(401)),
            Self::Status(status) => Err(CommunicationError::Status {
                status: *status,
                body: String::new(),
            }
            .into()),
        }
    }
}

pub(crate) struct StubSource {
    pub players: Mutex<Reply<Vec<PlayerRecord>>>,
    pub info: Mutex<HashMap<String, Reply<PlayerInfo>>>,
    pub cec: Mutex<HashMap<String, Reply<CecStatus>>>,
    pub now_playing: Mutex<HashMap<String, Reply<Option<NowPlaying>>>>,
    pub slots: Mutex<HashMap<String, Reply<Vec<ScheduleSlot>>>>,
    pub status: Mutex<HashMap<String, Reply<ScheduleStatus>>>,
    pub list_delay: Mutex<Duration>,
    pub list_calls: AtomicUsize,
    pub sub_calls: AtomicUsize,
}

impl StubSource {
    pub fn new(players: Vec<PlayerRecord>) -> Self {
        Self {
            players: Mutex::new(Reply::Ok(players)),
            info: Mutex::default(),
            cec: Mutex::default(),
            now_playing: Mutex::default(),
            slots: Mutex::default(),
            status: Mutex::default(),
            list_delay: Mutex::new(Duration::ZERO),
            list_calls: AtomicUsize::new(0),
            sub_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_players(&self, reply: Reply<Vec<PlayerRecord>>) {
        *self.players.lock().unwrap() = reply;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn sub<T: Clone + Default>(&self, map: &Mutex<HashMap<String, Reply<T>>>, id: &str) -> ApiResult<T> {
        self.sub_calls.fetch_add(1, Ordering::SeqCst);
        map.lock()
            .unwrap()
            .get(id)
            .map(Reply::resolve)
            .unwrap_or_else(|| Ok(T::default()))
    }
}

pub(crate) fn record(id: &str, name: &str, online: bool, last_status: Value) -> PlayerRecord {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "is_online": online,
        "last_seen": "2026-10-01T12:00:00Z",
        "last_status": last_status,
    }))
    .unwrap()
}

pub(crate) fn info(value: Value) -> PlayerInfo {
    serde_json::from_value(value).unwrap()
}

#[async_trait]
impl FleetSource for StubSource {
    async fn list_players(&self) -> ApiResult<Vec<PlayerRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = self.players.lock().unwrap().clone();
        reply.resolve()
    }

    async fn player_info(&self, player_id: &str) -> ApiResult<PlayerInfo> {
        self.sub(&self.info, player_id)
    }

    async fn cec_status(&self, player_id: &str) -> ApiResult<CecStatus> {
        self.sub(&self.cec, player_id)
    }

    async fn now_playing(&self, player_id: &str) -> ApiResult<Option<NowPlaying>> {
        self.sub(&self.now_playing, player_id)
    }

    async fn schedule_slots(&self, player_id: &str) -> ApiResult<Vec<ScheduleSlot>> {
        self.sub(&self.slots, player_id)
    }

    async fn schedule_status(&self, player_id: &str) -> ApiResult<ScheduleStatus> {
        self.sub(&self.status, player_id)
    }

    async fn media_files(&self) -> ApiResult<Vec<MediaFile>> {
        Ok(Vec::new())
    }
}
