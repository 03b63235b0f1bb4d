//! Domain constants and configuration defaults.
//!
//! Values mirror the settings the archiver has shipped with historically;
//! anything here can be overridden through [`crate::config`].

/// Payload size below which a task is considered high priority (1 MB).
pub const HIGH_PRIORITY_MAX_BYTES: u64 = 1_000_000;

/// Payload size below which a task is considered medium priority (10 MB).
pub const MEDIUM_PRIORITY_MAX_BYTES: u64 = 10_000_000;

/// Default maximum retry attempts before a task is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay before the first retry of a high-priority task.
pub const DEFAULT_BASE_RETRY_DELAY_HIGH_SECS: u64 = 5;

/// Default base delay before the first retry of a medium-priority task.
pub const DEFAULT_BASE_RETRY_DELAY_MEDIUM_SECS: u64 = 10;

/// Default base delay before the first retry of a low-priority task.
pub const DEFAULT_BASE_RETRY_DELAY_LOW_SECS: u64 = 15;

/// Default multiplier base for exponential backoff between retries.
pub const DEFAULT_EXPONENTIAL_BASE_DELAY_SECS: u64 = 60;

/// Default ceiling on any single retry delay (24 hours).
pub const DEFAULT_MAX_RETRY_DELAY_SECS: u64 = 86_400;

/// Default wall-clock age after which a failing task is dead-lettered.
pub const DEFAULT_DEAD_LETTER_THRESHOLD_DAYS: u32 = 7;

/// Default age after which an `in_progress` task from a crashed run is
/// reclaimed as pending.
pub const DEFAULT_STALE_IN_PROGRESS_SECS: u64 = 3_600;

/// Default time-to-live for recovery cache entries (24 hours).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Default ceiling on recovery cache entry count.
pub const DEFAULT_MAX_CACHE_ENTRIES: u64 = 10_000;

/// Default interval between cache cleanup sweeps (1 hour).
pub const DEFAULT_CACHE_CLEANUP_INTERVAL_SECS: u64 = 3_600;

/// Default per-provider recovery attempt timeout.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent download workers per run.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 3;

/// Default per-run storage budget in megabytes.
pub const DEFAULT_MAX_DAILY_STORAGE_MB: u64 = 1_024;

/// Default number of due tasks pulled per dispatcher batch.
pub const DEFAULT_DEQUEUE_BATCH_SIZE: usize = 50;
