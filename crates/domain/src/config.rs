//! Configuration structures for the acquisition engine.
//!
//! Everything is plain data with serde support so the infra layer can load
//! it from environment variables or a TOML file. Defaults come from
//! [`crate::constants`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Durable store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Retry queue scheduling policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Recovery cache TTL and capacity limits.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Per-provider cascade settings.
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Per-run dispatcher limits.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file holding the retry queue and recovery cache.
    pub path: String,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "stash.db".to_string(), pool_size: 4 }
    }
}

/// Scheduling policy for the retry queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempt-count ceiling; one more failure past this dead-letters the
    /// task.
    pub max_retries: u32,
    /// Initial delay for high-priority tasks, in seconds.
    pub base_retry_delay_high_secs: u64,
    /// Initial delay for medium-priority tasks, in seconds.
    pub base_retry_delay_medium_secs: u64,
    /// Initial delay for low-priority tasks, in seconds.
    pub base_retry_delay_low_secs: u64,
    /// Base for exponential backoff between re-attempts, in seconds.
    pub exponential_base_delay_secs: u64,
    /// Ceiling on any single backoff delay, in seconds.
    pub max_retry_delay_secs: u64,
    /// Wall-clock ceiling: tasks failing for longer than this are
    /// dead-lettered regardless of attempt count.
    pub dead_letter_threshold_days: u32,
    /// Age past which an `in_progress` task left by a crashed run is
    /// reclaimed as pending, in seconds.
    pub stale_in_progress_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base_retry_delay_high_secs: constants::DEFAULT_BASE_RETRY_DELAY_HIGH_SECS,
            base_retry_delay_medium_secs: constants::DEFAULT_BASE_RETRY_DELAY_MEDIUM_SECS,
            base_retry_delay_low_secs: constants::DEFAULT_BASE_RETRY_DELAY_LOW_SECS,
            exponential_base_delay_secs: constants::DEFAULT_EXPONENTIAL_BASE_DELAY_SECS,
            max_retry_delay_secs: constants::DEFAULT_MAX_RETRY_DELAY_SECS,
            dead_letter_threshold_days: constants::DEFAULT_DEAD_LETTER_THRESHOLD_DAYS,
            stale_in_progress_secs: constants::DEFAULT_STALE_IN_PROGRESS_SECS,
        }
    }
}

impl RetryPolicy {
    /// Dead-letter wall-clock threshold in seconds.
    pub fn dead_letter_threshold_secs(&self) -> i64 {
        i64::from(self.dead_letter_threshold_days) * 86_400
    }
}

/// Recovery cache limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Uniform TTL applied to every cache entry, successes and exhaustions
    /// alike, in seconds.
    pub ttl_secs: u64,
    /// Ceiling on cache entry count; the sweeper evicts oldest-first above
    /// this.
    pub max_entries: u64,
    /// Interval between background cleanup sweeps, in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: constants::DEFAULT_CACHE_TTL_SECS,
            max_entries: constants::DEFAULT_MAX_CACHE_ENTRIES,
            cleanup_interval_secs: constants::DEFAULT_CACHE_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Cleanup interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Settings for one recovery provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Whether this provider participates in the cascade.
    pub enabled: bool,
    /// Per-attempt timeout, in seconds.
    pub timeout_secs: u64,
    /// Requests-per-minute ceiling for this upstream.
    pub requests_per_minute: u64,
}

impl ProviderSettings {
    fn new(requests_per_minute: u64) -> Self {
        Self {
            enabled: true,
            timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT_SECS,
            requests_per_minute,
        }
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cascade configuration for all four providers.
///
/// Rate ceilings differ per upstream by roughly an order of magnitude; the
/// defaults reflect what each service tolerates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Archive-snapshot service (Wayback Machine).
    pub archive_snapshot: ProviderSettings,
    /// Post/comment archive service (PullPush).
    pub post_archive: ProviderSettings,
    /// Platform-native preview service.
    pub platform_preview: ProviderSettings,
    /// Removed-content recovery service (Reveddit).
    pub removed_content: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            archive_snapshot: ProviderSettings::new(15),
            post_archive: ProviderSettings::new(10),
            platform_preview: ProviderSettings::new(30),
            removed_content: ProviderSettings::new(4),
        }
    }
}

/// Per-run dispatcher limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Bounded worker pool size for parallel downloads.
    pub max_concurrent_downloads: usize,
    /// Cumulative bytes fetched per run, expressed in megabytes. Once
    /// exceeded no new attempts start; in-flight ones finish.
    pub max_daily_storage_mb: u64,
    /// Number of due tasks pulled per dequeue batch.
    pub dequeue_batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: constants::DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_daily_storage_mb: constants::DEFAULT_MAX_DAILY_STORAGE_MB,
            dequeue_batch_size: constants::DEFAULT_DEQUEUE_BATCH_SIZE,
        }
    }
}

impl DispatcherConfig {
    /// Per-run storage budget in bytes.
    pub fn storage_budget_bytes(&self) -> u64 {
        self.max_daily_storage_mb.saturating_mul(1_000_000)
    }
}
