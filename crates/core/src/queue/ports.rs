//! Port interfaces for retry queue operations.

use async_trait::async_trait;
use stash_domain::{OperationKind, Result, RetryTask};

/// Per-status counts for a run report or operator inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks waiting for their next attempt.
    pub pending: u64,
    /// Tasks claimed by a dispatcher run.
    pub in_progress: u64,
    /// Tasks retained in the terminal dead-letter state.
    pub dead_lettered: u64,
    /// Pending tasks whose `next_attempt_at` has passed.
    pub ready: u64,
}

/// Trait for the durable retry queue.
///
/// Task identity is `(url, operation)`. Implementations must keep at most
/// one live task per identity and apply every mutation as a single atomic
/// upsert so a mid-flight abort never leaves a torn record.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Record a failed acquisition.
    ///
    /// Idempotent: if any task already exists for this identity it is
    /// returned unchanged, dead-lettered rows included. Dead-lettered
    /// stays terminal until an operator calls [`requeue_dead_lettered`].
    /// Otherwise a fresh pending task is created with priority derived
    /// from `estimated_size` and `next_attempt_at` set from the priority
    /// base delay.
    ///
    /// [`requeue_dead_lettered`]: RetryQueue::requeue_dead_lettered
    async fn enqueue(
        &self,
        url: &str,
        operation: OperationKind,
        estimated_size: u64,
        error: &str,
    ) -> Result<RetryTask>;

    /// Return up to `limit` pending tasks with `next_attempt_at <= now`,
    /// ordered by priority then `next_attempt_at`, marking them
    /// `in_progress` atomically with the read.
    async fn dequeue_due(&self, now: i64, limit: usize) -> Result<Vec<RetryTask>>;

    /// Delete a task after a successful attempt.
    async fn on_success(&self, task: &RetryTask) -> Result<()>;

    /// Return a claimed task to pending without recording an attempt.
    ///
    /// Used when a run stops before the attempt starts, for example when
    /// the storage budget trips or a shutdown is requested.
    async fn release(&self, task: &RetryTask) -> Result<()>;

    /// Record a failed attempt: reschedule with backoff, or dead-letter
    /// when a ceiling trips. Returns the updated task.
    async fn on_failure(&self, task: &RetryTask, error: &str, now: i64) -> Result<RetryTask>;

    /// List dead-lettered tasks for manual inspection, most recent first.
    async fn dead_lettered(&self, limit: usize) -> Result<Vec<RetryTask>>;

    /// Operator action: put a dead-lettered task back into the queue as a
    /// fresh pending task with its attempt count reset.
    async fn requeue_dead_lettered(&self, url: &str, operation: OperationKind) -> Result<bool>;

    /// Crash recovery: flip `in_progress` tasks older than the staleness
    /// threshold back to pending. Returns the number reclaimed.
    async fn reclaim_stale(&self, now: i64) -> Result<usize>;

    /// Per-status counts.
    async fn stats(&self, now: i64) -> Result<QueueStats>;
}

/// Payload produced by a successful direct acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    /// Bytes fetched, counted against the per-run storage budget.
    pub bytes: u64,
    /// Where the content was persisted by the fetcher.
    pub stored_at: String,
}

/// How a direct acquisition failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, 5xx, connection failure: a retry candidate.
    Transient(String),
    /// Confirmed permanently unavailable (404/410, deleted upstream):
    /// routed straight into the recovery cascade, never enqueued.
    Gone(String),
}

impl FetchError {
    /// Message carried by either variant.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(msg) | Self::Gone(msg) => msg,
        }
    }
}

/// Externally supplied HTTP-fetch capability for the primary download path.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Attempt the direct acquisition of `url`.
    async fn fetch(
        &self,
        url: &str,
        operation: OperationKind,
    ) -> std::result::Result<FetchedContent, FetchError>;
}
