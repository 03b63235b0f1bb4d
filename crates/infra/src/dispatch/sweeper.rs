//! Periodic recovery-cache maintenance.
//!
//! The cache repository already enforces capacity at insert time and
//! treats expired rows as absent on read. This service reclaims the disk
//! space behind both: a background loop deletes expired rows and any
//! overflow on a fixed interval, with explicit start/stop lifecycle and
//! graceful cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stash_domain::{CacheConfig, Result, StashError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::database::SqliteRecoveryCache;

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Row counts removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries deleted because their TTL elapsed.
    pub expired: usize,
    /// Entries deleted because the cache was over capacity.
    pub evicted: usize,
}

/// Background sweeper over the recovery cache.
pub struct CacheSweeper {
    cache: Arc<SqliteRecoveryCache>,
    interval: Duration,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl CacheSweeper {
    /// Build a sweeper running at the configured cleanup interval.
    pub fn new(cache: Arc<SqliteRecoveryCache>, config: &CacheConfig) -> Self {
        Self {
            cache,
            interval: config.cleanup_interval(),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background sweep loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper is already running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Err(StashError::Config("cache sweeper already running".to_string()));
        }

        info!(interval_secs = self.interval.as_secs(), "starting cache sweeper");

        // Fresh token so the sweeper can restart after a stop.
        self.cancellation_token = CancellationToken::new();

        let cache = Arc::clone(&self.cache);
        let interval = self.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sweep_loop(cache, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Stop the sweep loop and await the background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the sweeper is not running or does not stop
    /// within the shutdown timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running().await {
            return Err(StashError::Config("cache sweeper not running".to_string()));
        }

        info!("stopping cache sweeper");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "sweep task panicked");
                    return Err(StashError::Internal(format!("sweep task panicked: {err}")));
                }
                Err(_) => {
                    warn!("sweep task did not stop within timeout");
                    return Err(StashError::Internal(
                        "sweep task did not stop within timeout".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Whether the background task is currently alive.
    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run a single sweep immediately.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<SweepStats> {
        let expired = self.cache.evict_expired(Utc::now().timestamp()).await?;
        let evicted = self.cache.evict_over_capacity().await?;

        if expired > 0 || evicted > 0 {
            info!(expired, evicted, "cache sweep removed entries");
        } else {
            debug!("cache sweep found nothing to remove");
        }

        Ok(SweepStats { expired, evicted })
    }

    async fn sweep_loop(
        cache: Arc<SqliteRecoveryCache>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sweep loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let expired = cache.evict_expired(Utc::now().timestamp()).await;
                    let evicted = cache.evict_over_capacity().await;
                    match (expired, evicted) {
                        (Ok(expired), Ok(evicted)) => {
                            debug!(expired, evicted, "periodic cache sweep completed");
                        }
                        (Err(err), _) | (_, Err(err)) => {
                            warn!(error = %err, "periodic cache sweep failed");
                        }
                    }
                }
            }
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        // Drop cannot await the handle, cancelling is best effort.
        if !self.cancellation_token.is_cancelled() {
            warn!("CacheSweeper dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use stash_core::RecoveryCache;
    use stash_domain::{ProviderKind, RecoveryCacheEntry, ResolvedLocation};
    use tempfile::TempDir;

    use super::*;
    use crate::database::DbManager;

    fn setup_cache(config: CacheConfig) -> (Arc<SqliteRecoveryCache>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join("sweeper.db");
        let db = Arc::new(
            DbManager::new(db_path.to_str().expect("utf8 path"), 2).expect("db manager"),
        );
        db.run_migrations().expect("migrations");
        (Arc::new(SqliteRecoveryCache::new(db, config)), temp_dir)
    }

    fn entry(url: &str, expires_at: i64) -> RecoveryCacheEntry {
        let location = ResolvedLocation {
            url: format!("{url}?recovered"),
            provider: ProviderKind::ArchiveSnapshot,
        };
        let mut entry = RecoveryCacheEntry::recovered(
            url,
            &location,
            Utc::now().timestamp(),
            Duration::from_secs(60),
        );
        entry.expires_at = expires_at;
        entry
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_start_and_stop() {
        let (cache, _temp_dir) = setup_cache(CacheConfig::default());
        let mut sweeper = CacheSweeper::new(cache, &CacheConfig::default());

        assert!(!sweeper.is_running().await);

        sweeper.start().await.expect("sweeper starts");
        assert!(sweeper.is_running().await);

        sweeper.stop().await.expect("sweeper stops");
        assert!(!sweeper.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_an_error() {
        let (cache, _temp_dir) = setup_cache(CacheConfig::default());
        let mut sweeper = CacheSweeper::new(cache, &CacheConfig::default());

        sweeper.start().await.expect("first start succeeds");
        assert!(sweeper.start().await.is_err());

        sweeper.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sweep_once_removes_expired_entries() {
        let (cache, _temp_dir) = setup_cache(CacheConfig::default());
        let now = Utc::now().timestamp();

        cache.put(&entry("https://example.com/old.jpg", now - 10)).await.expect("put");
        cache.put(&entry("https://example.com/live.jpg", now + 3_600)).await.expect("put");

        let sweeper = CacheSweeper::new(Arc::clone(&cache), &CacheConfig::default());
        let stats = sweeper.sweep_once().await.expect("sweep succeeds");

        assert_eq!(stats.expired, 1);
        assert_eq!(stats.evicted, 0);
        assert_eq!(cache.len().await.expect("len"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_token_stops_the_loop() {
        let (cache, _temp_dir) = setup_cache(CacheConfig::default());
        let config = CacheConfig { cleanup_interval_secs: 1, ..Default::default() };
        let mut sweeper = CacheSweeper::new(cache, &config);

        sweeper.start().await.expect("start succeeds");
        sweeper.cancellation_token.cancel();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!sweeper.is_running().await);
    }
}
