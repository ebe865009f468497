//! Time-bounded cache for the Fleet Manager media library
//!
//! The media library is fleet-wide and changes rarely, so it is fetched at
//! most once per TTL instead of on every poll cycle. An empty cached list is
//! treated as a miss so a fleet that had no media yet picks up new uploads
//! on the next read.
//!
//! # Example
//!
//! ```rust,ignore
//! use anthias_fleet::cache::MediaLibraryCache;
//!
//! let cache = MediaLibraryCache::new(client.clone());
//! let files = cache.get().await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::client::{ApiResult, FleetSource};
use crate::metrics;
use crate::models::MediaFile;

/// Default media library TTL (5 minutes)
pub const DEFAULT_MEDIA_TTL: Duration = Duration::from_secs(300);

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from the cached list
    pub hits: u64,
    /// Reads that went to the Fleet Manager
    pub misses: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedLibrary {
    files: Vec<MediaFile>,
    fetched_at: Instant,
}

/// Media library cache with a fixed TTL
pub struct MediaLibraryCache<S> {
    source: Arc<S>,
    ttl: Duration,
    entry: RwLock<Option<CachedLibrary>>,
    refresh_lock: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: FleetSource> MediaLibraryCache<S> {
    /// Create a cache with the default 300s TTL
    pub fn new(source: Arc<S>) -> Self {
        Self::with_ttl(source, DEFAULT_MEDIA_TTL)
    }

    /// Create a cache with a custom TTL
    pub fn with_ttl(source: Arc<S>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Media files, fetched only when the cached list is stale or empty
    ///
    /// A failed fetch is returned to the caller and leaves any previously
    /// cached list in place.
    pub async fn get(&self) -> ApiResult<Vec<MediaFile>> {
        if let Some(files) = self.fresh().await {
            self.record(true);
            return Ok(files);
        }

        // One fetch at a time; a waiter re-checks what the winner stored
        let _guard = self.refresh_lock.lock().await;
        if let Some(files) = self.fresh().await {
            self.record(true);
            return Ok(files);
        }

        self.record(false);
        let files = self.source.media_files().await?;
        tracing::debug!(count = files.len(), "Media library refreshed");

        *self.entry.write().await = Some(CachedLibrary {
            files: files.clone(),
            fetched_at: Instant::now(),
        });

        Ok(files)
    }

    /// Drop the cached list so the next read fetches
    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    /// Age of the cached list, if any
    pub async fn age(&self) -> Option<Duration> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|cached| cached.fetched_at.elapsed())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_media_cache(hit);
    }

    async fn fresh(&self) -> Option<Vec<MediaFile>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|cached| !cached.files.is_empty() && cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.files.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, CommunicationError};
    use crate::models::{CecStatus, NowPlaying, PlayerInfo, PlayerRecord, ScheduleSlot, ScheduleStatus};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct MediaStub {
        calls: AtomicUsize,
        empty: AtomicBool,
        fail: AtomicBool,
    }

    #[async_trait]
    impl FleetSource for MediaStub {
        async fn list_players(&self) -> ApiResult<Vec<PlayerRecord>> {
            Ok(Vec::new())
        }
        async fn player_info(&self, _: &str) -> ApiResult<PlayerInfo> {
            Ok(PlayerInfo::default())
        }
        async fn cec_status(&self, _: &str) -> ApiResult<CecStatus> {
            Ok(CecStatus::default())
        }
        async fn now_playing(&self, _: &str) -> ApiResult<Option<NowPlaying>> {
            Ok(None)
        }
        async fn schedule_slots(&self, _: &str) -> ApiResult<Vec<ScheduleSlot>> {
            Ok(Vec::new())
        }
        async fn schedule_status(&self, _: &str) -> ApiResult<ScheduleStatus> {
            Ok(ScheduleStatus::default())
        }
        async fn media_files(&self) -> ApiResult<Vec<MediaFile>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Communication(CommunicationError::Timeout));
            }
            if self.empty.load(Ordering::SeqCst) {
                return Ok(Vec::new());
            }
            Ok(vec![MediaFile {
                id: Some(format!("m{n}")),
                name: Some("clip.mp4".to_string()),
                ..Default::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_fetches_once_within_ttl() {
        let stub = Arc::new(MediaStub::default());
        let cache = MediaLibraryCache::new(stub.clone());

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let stub = Arc::new(MediaStub::default());
        let cache = MediaLibraryCache::with_ttl(stub.clone(), Duration::from_millis(20));

        cache.get().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let files = cache.get().await.unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
        assert_eq!(files[0].id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_empty_list_is_refetched() {
        let stub = Arc::new(MediaStub::default());
        stub.empty.store(true, Ordering::SeqCst);
        let cache = MediaLibraryCache::new(stub.clone());

        assert!(cache.get().await.unwrap().is_empty());
        assert!(cache.get().await.unwrap().is_empty());

        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_entry() {
        let stub = Arc::new(MediaStub::default());
        let cache = MediaLibraryCache::with_ttl(stub.clone(), Duration::from_millis(20));

        cache.get().await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        stub.fail.store(true, Ordering::SeqCst);
        assert!(cache.get().await.is_err());
        assert!(cache.age().await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let stub = Arc::new(MediaStub::default());
        let cache = MediaLibraryCache::new(stub.clone());

        cache.get().await.unwrap();
        cache.invalidate().await;
        cache.get().await.unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats { hits: 3, misses: 1 };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
