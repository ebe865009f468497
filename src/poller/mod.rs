//! Fleet poller
//!
//! Owns the refresh cadence: a timer task runs one [`SnapshotBuilder`]
//! cycle per tick, and every completed cycle is published as a whole
//! through a `watch` channel. Cycles never overlap; a refresh requested
//! while one is in flight joins that cycle instead of starting another.
//!
//! ```text
//! Uninitialized --ok--> Active <--ok/err--> Degraded
//!        \                  \                  /
//!         `---- auth error --> AuthFailed <---'      (resume() to retry)
//! any state --stop()--> Stopped
//! ```

mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::FleetSource;
use crate::metrics;
use crate::models::FleetSnapshot;
use crate::snapshot::{BuilderConfig, CycleStats, SnapshotBuilder};

pub use state::{FleetView, PollEvent, PollerState, RefreshError, RefreshRequest};

/// Default time between timer-driven cycles
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// Poller Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between timer-driven cycles
    pub scan_interval: Duration,

    /// Snapshot builder settings
    pub builder: BuilderConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            builder: BuilderConfig::default(),
        }
    }
}

impl PollerConfig {
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_builder(mut self, builder: BuilderConfig) -> Self {
        self.builder = builder;
        self
    }
}

// ============================================================================
// Fleet Poller
// ============================================================================

struct Inner<S> {
    builder: SnapshotBuilder<S>,
    scan_interval: Duration,
    view_tx: watch::Sender<FleetView>,
    event_sender: broadcast::Sender<PollEvent>,
    cycle: Mutex<()>,
    in_flight: AtomicBool,
    trigger: Notify,
    auth_paused: AtomicBool,
    /// Error of the most recent cycle, handed to callers that joined it
    last_failure: StdMutex<Option<RefreshError>>,
    stopped: AtomicBool,
    shutdown: watch::Sender<bool>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to one fleet's poll loop
pub struct FleetPoller<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for FleetPoller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: FleetSource + 'static> FleetPoller<S> {
    /// Create a poller; nothing runs until [`first_refresh`](Self::first_refresh) or [`start`](Self::start)
    pub fn new(source: Arc<S>, config: PollerConfig) -> Self {
        let (view_tx, _) = watch::channel(FleetView::default());
        let (event_sender, _) = broadcast::channel(100);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                builder: SnapshotBuilder::new(source, config.builder),
                scan_interval: config.scan_interval,
                view_tx,
                event_sender,
                cycle: Mutex::new(()),
                in_flight: AtomicBool::new(false),
                trigger: Notify::new(),
                auth_paused: AtomicBool::new(false),
                last_failure: StdMutex::new(None),
                stopped: AtomicBool::new(false),
                shutdown,
                task: StdMutex::new(None),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    /// Latest published view
    pub fn current(&self) -> FleetView {
        self.inner.view_tx.borrow().clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<FleetSnapshot> {
        Arc::clone(&self.inner.view_tx.borrow().snapshot)
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.view_tx.borrow().last_update_success
    }

    pub fn state(&self) -> PollerState {
        self.inner.view_tx.borrow().state
    }

    /// Receiver that sees every published view
    pub fn subscribe(&self) -> watch::Receiver<FleetView> {
        self.inner.view_tx.subscribe()
    }

    /// Subscribe to poll events
    pub fn events(&self) -> broadcast::Receiver<PollEvent> {
        self.inner.event_sender.subscribe()
    }

    pub fn scan_interval(&self) -> Duration {
        self.inner.scan_interval
    }

    /// Whether the timer task is running
    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    /// Run the initial cycle
    ///
    /// On failure the poller stays `Uninitialized` and the error is returned
    /// so the caller can decide whether to start anyway.
    pub async fn first_refresh(&self) -> Result<(), RefreshError> {
        self.refresh().await.map(|_| ())
    }

    /// Run a cycle now
    ///
    /// Returns `Ok(None)` when a cycle was already in flight; the call then
    /// waits for that cycle to finish and does not start another. If the
    /// joined cycle failed, its error is returned here too.
    pub async fn refresh(&self) -> Result<Option<CycleStats>, RefreshError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(RefreshError::Stopped);
        }

        match self.inner.cycle.try_lock() {
            Ok(_guard) => {
                self.inner.in_flight.store(true, Ordering::SeqCst);
                let result = self.run_cycle().await;
                self.inner.in_flight.store(false, Ordering::SeqCst);
                result.map(Some)
            }
            Err(_) => {
                tracing::debug!("Refresh coalesced with in-flight cycle");
                let _guard = self.inner.cycle.lock().await;
                if self.inner.stopped.load(Ordering::SeqCst) {
                    return Err(RefreshError::Stopped);
                }
                match self.lock_last_failure().clone() {
                    Some(error) => Err(error),
                    None => Ok(None),
                }
            }
        }
    }

    /// Ask for a cycle without waiting for it
    pub fn request_refresh(&self) -> Result<RefreshRequest, RefreshError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(RefreshError::Stopped);
        }

        if self.inner.in_flight.load(Ordering::SeqCst) {
            return Ok(RefreshRequest::Coalesced);
        }

        if self.is_running() {
            // Stored permits collapse, so repeated requests wake the task once
            self.inner.trigger.notify_one();
        } else {
            let poller = self.clone();
            tokio::spawn(async move {
                if let Err(e) = poller.refresh().await {
                    tracing::debug!(error = %e, "Requested refresh failed");
                }
            });
        }

        Ok(RefreshRequest::Scheduled)
    }

    /// Re-enable timer cycles after new credentials were installed
    pub fn resume(&self) -> Result<RefreshRequest, RefreshError> {
        if self.inner.auth_paused.swap(false, Ordering::SeqCst) {
            tracing::info!("Resuming fleet polling after re-authorization");
        }
        self.request_refresh()
    }

    async fn run_cycle(&self) -> Result<CycleStats, RefreshError> {
        let started = Instant::now();
        let result = self.inner.builder.build().await;

        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(RefreshError::Stopped);
        }

        match result {
            Ok(output) => {
                let stats = output.stats;
                metrics::record_cycle_success(&stats);
                self.inner.auth_paused.store(false, Ordering::SeqCst);
                *self.lock_last_failure() = None;

                self.inner.view_tx.send_replace(FleetView {
                    snapshot: Arc::new(output.snapshot),
                    last_update_success: true,
                    state: PollerState::Active,
                    refreshed_at: Some(Utc::now()),
                    last_error: None,
                });

                tracing::info!(
                    players = stats.players,
                    online = stats.online,
                    failures = stats.total_failures(),
                    duration_ms = stats.duration.as_millis() as u64,
                    "Fleet refreshed"
                );
                let _ = self.inner.event_sender.send(PollEvent::Refreshed {
                    players: stats.players,
                    online: stats.online,
                    failures: stats.total_failures(),
                    duration_ms: stats.duration.as_millis() as u64,
                });

                Ok(stats)
            }
            Err(error) => {
                let message = error.to_string();
                let auth = error.is_auth();
                metrics::record_cycle_failure(auth, started.elapsed());

                self.inner.view_tx.send_modify(|view| {
                    view.last_update_success = false;
                    view.last_error = Some(message.clone());
                    // Only a successful cycle clears AuthFailed
                    view.state = match (auth, view.state) {
                        (true, _) => PollerState::AuthFailed,
                        (false, PollerState::Uninitialized) => PollerState::Uninitialized,
                        (false, PollerState::AuthFailed) => PollerState::AuthFailed,
                        (false, _) => PollerState::Degraded,
                    };
                });

                if auth {
                    self.inner.auth_paused.store(true, Ordering::SeqCst);
                    tracing::error!(error = %message, "Fleet Manager rejected credentials; polling paused");
                    let _ = self
                        .inner
                        .event_sender
                        .send(PollEvent::AuthenticationFailed { error: message });
                    let failure = RefreshError::AuthFailed(error);
                    *self.lock_last_failure() = Some(failure.clone());
                    Err(failure)
                } else {
                    tracing::warn!(error = %message, "Fleet refresh failed; keeping previous snapshot");
                    let _ = self
                        .inner
                        .event_sender
                        .send(PollEvent::RefreshFailed { error: message });
                    let failure = RefreshError::UpdateFailed(error);
                    *self.lock_last_failure() = Some(failure.clone());
                    Err(failure)
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Spawn the timer task. Returns `false` if it is already running or the poller was stopped.
    pub fn start(&self) -> bool {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return false;
        }

        let mut task = self.lock_task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let poller = self.clone();
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        *task = Some(tokio::spawn(async move {
            poller.run_timer(&mut shutdown_rx).await;
        }));

        tracing::info!(
            interval_secs = self.inner.scan_interval.as_secs_f64(),
            "Fleet poller started"
        );
        true
    }

    async fn run_timer(&self, shutdown_rx: &mut watch::Receiver<bool>) {
        let period = self.inner.scan_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.inner.auth_paused.load(Ordering::SeqCst) {
                        tracing::debug!("Timer cycle skipped until credentials are renewed");
                        continue;
                    }
                    self.timer_cycle().await;
                }
                _ = self.inner.trigger.notified() => {
                    self.timer_cycle().await;
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("Fleet poller shutting down");
                    break;
                }
            }
        }
    }

    async fn timer_cycle(&self) {
        // Failures are already published and logged by run_cycle
        if let Err(RefreshError::Stopped) = self.refresh().await {
            tracing::debug!("Cycle skipped after stop");
        }
    }

    /// Stop the timer task and publish `Stopped`
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.inner.shutdown.send(true);
        let handle = self.lock_task().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Poller task ended abnormally");
            }
        }

        self.inner.view_tx.send_modify(|view| view.state = PollerState::Stopped);
        let _ = self.inner.event_sender.send(PollEvent::Stopped);
        tracing::info!("Fleet poller stopped");
    }

    fn lock_last_failure(&self) -> std::sync::MutexGuard<'_, Option<RefreshError>> {
        match self.inner.last_failure.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.inner.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{info, record, Reply, StubSource};
    use serde_json::json;

    fn stub() -> Arc<StubSource> {
        let stub = StubSource::new(vec![
            record("p1", "Lobby", true, json!({"cpu_usage": 10})),
            record("p2", "Hall", false, json!({})),
        ]);
        stub.info
            .lock()
            .unwrap()
            .insert("p1".into(), Reply::Ok(info(json!({"cpu_usage": 55}))));
        Arc::new(stub)
    }

    fn poller(stub: &Arc<StubSource>) -> FleetPoller<StubSource> {
        FleetPoller::new(stub.clone(), PollerConfig::default())
    }

    #[tokio::test]
    async fn test_initial_state() {
        let poller = poller(&stub());
        let view = poller.current();

        assert_eq!(view.state, PollerState::Uninitialized);
        assert!(!view.last_update_success);
        assert!(view.snapshot.is_empty());
        assert!(view.refreshed_at.is_none());
    }

    #[tokio::test]
    async fn test_first_refresh_activates() {
        let poller = poller(&stub());
        poller.first_refresh().await.unwrap();

        assert_eq!(poller.state(), PollerState::Active);
        assert!(poller.last_update_success());
        assert_eq!(poller.snapshot().len(), 2);
        assert_eq!(poller.snapshot().get("p1").unwrap().info.cpu_usage(), Some(55.0));
    }

    #[tokio::test]
    async fn test_first_refresh_failure_stays_uninitialized() {
        let stub = stub();
        stub.set_players(Reply::Status(502));
        let poller = poller(&stub);

        let err = poller.first_refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::UpdateFailed(_)));
        assert_eq!(poller.state(), PollerState::Uninitialized);
        assert!(poller.current().last_error.is_some());
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_snapshot() {
        let stub = stub();
        let poller = poller(&stub);
        poller.first_refresh().await.unwrap();
        let before = poller.snapshot();

        stub.set_players(Reply::Timeout);
        assert!(poller.refresh().await.is_err());

        assert_eq!(poller.state(), PollerState::Degraded);
        assert!(!poller.last_update_success());
        assert!(Arc::ptr_eq(&before, &poller.snapshot()));

        stub.set_players(Reply::Ok(vec![record("p3", "Foyer", false, json!(null))]));
        poller.refresh().await.unwrap();

        assert_eq!(poller.state(), PollerState::Active);
        assert!(poller.last_update_success());
        assert!(poller.snapshot().contains("p3"));
        assert!(!poller.snapshot().contains("p1"));
    }

    #[tokio::test]
    async fn test_auth_failure_pauses_until_resume() {
        let stub = stub();
        let poller = poller(&stub);
        poller.first_refresh().await.unwrap();
        let mut events = poller.events();

        stub.set_players(Reply::Auth);
        let err = poller.refresh().await.unwrap_err();

        assert!(matches!(err, RefreshError::AuthFailed(_)));
        assert_eq!(poller.state(), PollerState::AuthFailed);
        assert_eq!(poller.snapshot().len(), 2);
        assert!(poller.inner.auth_paused.load(Ordering::SeqCst));
        assert!(matches!(
            events.recv().await.unwrap(),
            PollEvent::AuthenticationFailed { .. }
        ));

        stub.set_players(Reply::Ok(vec![record("p1", "Lobby", false, json!(null))]));
        poller.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!poller.inner.auth_paused.load(Ordering::SeqCst));
        assert_eq!(poller.state(), PollerState::Active);
    }

    #[tokio::test]
    async fn test_communication_error_keeps_auth_failed() {
        let stub = stub();
        let poller = FleetPoller::new(
            stub.clone(),
            PollerConfig::default().with_scan_interval(Duration::from_millis(20)),
        );
        poller.first_refresh().await.unwrap();

        stub.set_players(Reply::Auth);
        assert!(poller.refresh().await.unwrap_err().is_auth());

        stub.set_players(Reply::Status(502));
        let err = poller.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::UpdateFailed(_)));
        assert_eq!(poller.state(), PollerState::AuthFailed);
        assert!(!poller.last_update_success());

        // Timer stays paused while credentials are still unresolved
        let calls = stub.list_calls();
        assert!(poller.start());
        tokio::time::sleep(Duration::from_millis(150)).await;
        poller.stop().await;

        assert_eq!(stub.list_calls(), calls);
    }

    #[tokio::test]
    async fn test_joined_cycle_failure_is_reported() {
        let stub = stub();
        stub.set_players(Reply::Status(502));
        *stub.list_delay.lock().unwrap() = Duration::from_millis(100);
        let poller = poller(&stub);

        let (leader, joined) = tokio::join!(poller.refresh(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            poller.first_refresh().await
        });

        assert!(matches!(leader, Err(RefreshError::UpdateFailed(_))));
        assert!(matches!(joined, Err(RefreshError::UpdateFailed(_))));
        assert_eq!(poller.state(), PollerState::Uninitialized);
        assert_eq!(stub.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_joined_cycle_success_clears_earlier_failure() {
        let stub = stub();
        let poller = poller(&stub);

        stub.set_players(Reply::Timeout);
        assert!(poller.refresh().await.is_err());

        stub.set_players(Reply::Ok(vec![record("p1", "Lobby", false, json!(null))]));
        *stub.list_delay.lock().unwrap() = Duration::from_millis(100);
        let (leader, joined) = tokio::join!(poller.refresh(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            poller.refresh().await
        });

        assert!(leader.unwrap().is_some());
        assert!(joined.unwrap().is_none());
        assert_eq!(poller.state(), PollerState::Active);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_coalesced() {
        let stub = stub();
        *stub.list_delay.lock().unwrap() = Duration::from_millis(100);
        let poller = poller(&stub);

        let (a, b) = tokio::join!(poller.refresh(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            poller.refresh().await
        });

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_none());
        assert_eq!(stub.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_request_refresh_coalesces_in_flight() {
        let stub = stub();
        *stub.list_delay.lock().unwrap() = Duration::from_millis(100);
        let poller = poller(&stub);

        assert_eq!(poller.request_refresh().unwrap(), RefreshRequest::Scheduled);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(poller.request_refresh().unwrap(), RefreshRequest::Coalesced);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(stub.list_calls(), 1);
        assert_eq!(poller.state(), PollerState::Active);
    }

    #[tokio::test]
    async fn test_subscribers_see_complete_cycle() {
        let poller = poller(&stub());
        let mut rx = poller.subscribe();

        poller.refresh().await.unwrap();
        rx.changed().await.unwrap();

        let view = rx.borrow_and_update().clone();
        assert_eq!(view.snapshot.len(), 2);
        assert!(view.last_update_success);
    }

    #[tokio::test]
    async fn test_timer_drives_cycles() {
        let stub = stub();
        let poller = FleetPoller::new(
            stub.clone(),
            PollerConfig::default().with_scan_interval(Duration::from_millis(30)),
        );

        assert!(poller.start());
        assert!(!poller.start());
        tokio::time::sleep(Duration::from_millis(110)).await;
        poller.stop().await;

        assert!(stub.list_calls() >= 2);
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_terminal() {
        let poller = poller(&stub());
        poller.start();
        let mut events = poller.events();

        poller.stop().await;

        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(matches!(poller.refresh().await, Err(RefreshError::Stopped)));
        assert!(matches!(poller.request_refresh(), Err(RefreshError::Stopped)));
        assert!(!poller.start());
        assert!(matches!(events.recv().await.unwrap(), PollEvent::Stopped));
    }
}
