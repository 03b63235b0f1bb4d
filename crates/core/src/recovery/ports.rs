//! Port interfaces for recovery operations.

use std::time::Duration;

use async_trait::async_trait;
use stash_domain::{
    ProviderKind, ProviderResult, RecoveryCacheEntry, ResolvedLocation, Result,
};

/// Trait for the durable recovery outcome cache.
///
/// Implementations must return `None` for both never-seen and expired keys,
/// and must serialize writes (single-writer discipline) since several
/// acquisitions may resolve concurrently.
#[async_trait]
pub trait RecoveryCache: Send + Sync {
    /// Look up a fresh entry by normalized resource key.
    async fn get(&self, key: &str) -> Result<Option<RecoveryCacheEntry>>;

    /// Insert or replace the entry for its key in one atomic upsert.
    async fn put(&self, entry: &RecoveryCacheEntry) -> Result<()>;
}

/// Uniform capability of one external recovery service.
///
/// Adapters perform **no internal retries**: a timeout or upstream error
/// surfaces immediately as [`stash_domain::ProviderOutcome::Error`] and the
/// cascade proceeds to the next adapter. Each adapter enforces its own
/// requests-per-minute ceiling without blocking its siblings.
#[async_trait]
pub trait RecoveryProvider: Send + Sync {
    /// Which service this adapter fronts.
    fn kind(&self) -> ProviderKind;

    /// Try to locate a recoverable copy of `url` within `timeout`.
    async fn attempt(&self, url: &str, timeout: Duration) -> ProviderResult;
}

/// Externally supplied callback invoked with successfully recovered
/// content.
#[async_trait]
pub trait RecoveredContentSink: Send + Sync {
    /// Persist the recovered copy for `original_url`.
    async fn persist(&self, original_url: &str, location: &ResolvedLocation) -> Result<()>;
}
