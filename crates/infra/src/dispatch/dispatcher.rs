//! Per-run dispatcher draining due retry tasks.
//!
//! Each run claims due tasks in priority order and processes them on a
//! bounded worker pool. Two limits govern a run: the concurrency ceiling
//! and the cumulative byte budget. Once the budget trips no new attempts
//! start; in-flight attempts finish and claimed-but-unstarted tasks are
//! released back to pending untouched.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use stash_core::{
    ContentFetcher, FetchError, RecoveredContentSink, RecoveryCoordinator, RetryQueue,
};
use stash_domain::{
    DispatcherConfig, OperationKind, RecoveryOutcome, ResolvedLocation, Result, RetryTask,
    TaskStatus,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outcome counts for one dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Attempts that fetched successfully.
    pub succeeded: u64,
    /// Attempts that failed transiently and were rescheduled.
    pub rescheduled: u64,
    /// Attempts that tripped a dead-letter ceiling.
    pub dead_lettered: u64,
    /// Gone targets the cascade located a copy for.
    pub recovered: u64,
    /// Gone targets no provider could recover.
    pub not_recoverable: u64,
    /// Stale claims from a previous run returned to pending.
    pub reclaimed: u64,
    /// Cumulative bytes fetched this run.
    pub bytes_fetched: u64,
    /// Whether the byte budget stopped the run early.
    pub budget_exhausted: bool,
}

/// How a reported direct-acquisition failure was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// Transient failure, queued for a later run.
    Enqueued(RetryTask),
    /// Gone target the cascade located a copy for; the copy was persisted.
    Recovered(ResolvedLocation),
    /// Gone target no provider could recover.
    NotRecoverable,
}

#[derive(Default)]
struct RunCounters {
    succeeded: AtomicU64,
    rescheduled: AtomicU64,
    dead_lettered: AtomicU64,
    recovered: AtomicU64,
    not_recoverable: AtomicU64,
    bytes_fetched: AtomicU64,
    budget_exhausted: AtomicBool,
}

/// Drains the retry queue one run at a time.
pub struct Dispatcher {
    queue: Arc<dyn RetryQueue>,
    fetcher: Arc<dyn ContentFetcher>,
    coordinator: Arc<RecoveryCoordinator>,
    sink: Arc<dyn RecoveredContentSink>,
    config: DispatcherConfig,
    cancellation_token: CancellationToken,
}

impl Dispatcher {
    /// Build a dispatcher over the queue, the direct fetch path, and the
    /// recovery cascade.
    pub fn new(
        queue: Arc<dyn RetryQueue>,
        fetcher: Arc<dyn ContentFetcher>,
        coordinator: Arc<RecoveryCoordinator>,
        sink: Arc<dyn RecoveredContentSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            fetcher,
            coordinator,
            sink,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Token that stops the current run between attempts when cancelled.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Intake for acquisition failures discovered outside the queue.
    ///
    /// Transient failures are enqueued for a later run. Confirmed-gone
    /// targets never enter the queue: they go straight through the
    /// recovery cascade and, on a hit, into the sink.
    #[instrument(skip(self, error), fields(url = %url))]
    pub async fn report_direct_failure(
        &self,
        url: &str,
        operation: OperationKind,
        estimated_size: u64,
        error: FetchError,
    ) -> Result<IntakeOutcome> {
        match error {
            FetchError::Transient(message) => {
                let task = self.queue.enqueue(url, operation, estimated_size, &message).await?;
                debug!(next_attempt_at = task.next_attempt_at, "transient failure queued");
                Ok(IntakeOutcome::Enqueued(task))
            }
            FetchError::Gone(message) => {
                debug!(reason = %message, "gone target reported, entering cascade");
                match self.coordinator.resolve(url).await? {
                    RecoveryOutcome::Recovered(location) => {
                        self.sink.persist(url, &location).await?;
                        Ok(IntakeOutcome::Recovered(location))
                    }
                    RecoveryOutcome::NotRecoverable => Ok(IntakeOutcome::NotRecoverable),
                }
            }
        }
    }

    /// Process every currently-due task, within the run's limits.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<RunReport> {
        let reclaimed = self.queue.reclaim_stale(Utc::now().timestamp()).await?;

        let counters = Arc::new(RunCounters::default());
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_downloads.max(1)));
        let budget = self.config.storage_budget_bytes();

        loop {
            if self.cancellation_token.is_cancelled() {
                debug!("run cancelled between batches");
                break;
            }
            if counters.bytes_fetched.load(Ordering::SeqCst) >= budget {
                counters.budget_exhausted.store(true, Ordering::SeqCst);
                info!(budget_bytes = budget, "storage budget exhausted, stopping run");
                break;
            }

            let now = Utc::now().timestamp();
            let batch = self.queue.dequeue_due(now, self.config.dequeue_batch_size).await?;
            if batch.is_empty() {
                break;
            }
            debug!(claimed = batch.len(), "processing batch");

            let mut workers = JoinSet::new();
            for task in batch {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|err| stash_domain::StashError::Internal(err.to_string()))?;
                let worker = Worker {
                    queue: Arc::clone(&self.queue),
                    fetcher: Arc::clone(&self.fetcher),
                    coordinator: Arc::clone(&self.coordinator),
                    sink: Arc::clone(&self.sink),
                    counters: Arc::clone(&counters),
                    cancellation_token: self.cancellation_token.clone(),
                    budget,
                };
                workers.spawn(async move {
                    let result = worker.process(task).await;
                    drop(permit);
                    result
                });
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "attempt processing failed"),
                    Err(err) => warn!(error = %err, "attempt worker panicked"),
                }
            }
        }

        let report = RunReport {
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            rescheduled: counters.rescheduled.load(Ordering::SeqCst),
            dead_lettered: counters.dead_lettered.load(Ordering::SeqCst),
            recovered: counters.recovered.load(Ordering::SeqCst),
            not_recoverable: counters.not_recoverable.load(Ordering::SeqCst),
            reclaimed: reclaimed as u64,
            bytes_fetched: counters.bytes_fetched.load(Ordering::SeqCst),
            budget_exhausted: counters.budget_exhausted.load(Ordering::SeqCst),
        };

        info!(
            succeeded = report.succeeded,
            rescheduled = report.rescheduled,
            dead_lettered = report.dead_lettered,
            recovered = report.recovered,
            bytes_fetched = report.bytes_fetched,
            budget_exhausted = report.budget_exhausted,
            "dispatcher run finished"
        );

        Ok(report)
    }
}

struct Worker {
    queue: Arc<dyn RetryQueue>,
    fetcher: Arc<dyn ContentFetcher>,
    coordinator: Arc<RecoveryCoordinator>,
    sink: Arc<dyn RecoveredContentSink>,
    counters: Arc<RunCounters>,
    cancellation_token: CancellationToken,
    budget: u64,
}

impl Worker {
    async fn process(&self, task: RetryTask) -> Result<()> {
        // Budget and cancellation are re-checked here: the batch was
        // claimed before earlier workers reported their byte counts.
        if self.cancellation_token.is_cancelled() {
            return self.queue.release(&task).await;
        }
        if self.counters.bytes_fetched.load(Ordering::SeqCst) >= self.budget {
            self.counters.budget_exhausted.store(true, Ordering::SeqCst);
            return self.queue.release(&task).await;
        }

        match self.fetcher.fetch(&task.url, task.operation).await {
            Ok(content) => {
                self.queue.on_success(&task).await?;
                self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
                self.counters.bytes_fetched.fetch_add(content.bytes, Ordering::SeqCst);
                debug!(url = %task.url, bytes = content.bytes, "acquisition succeeded");
                Ok(())
            }
            Err(FetchError::Transient(message)) => self.reschedule(&task, &message).await,
            Err(FetchError::Gone(message)) => {
                // Permanently unavailable upstream: retrying the fetch is
                // pointless, so the cascade takes over. The task is only
                // deleted once the recovered copy is persisted (or the
                // cascade is exhausted); a resolve or sink error reschedules
                // it so the item is never silently dropped.
                debug!(url = %task.url, reason = %message, "target gone, entering cascade");

                let outcome = match self.coordinator.resolve(&task.url).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(url = %task.url, error = %err, "recovery lookup failed");
                        return self.reschedule(&task, &err.to_string()).await;
                    }
                };
                match outcome {
                    RecoveryOutcome::Recovered(location) => {
                        if let Err(err) = self.sink.persist(&task.url, &location).await {
                            warn!(url = %task.url, error = %err, "persisting recovered copy failed");
                            return self.reschedule(&task, &err.to_string()).await;
                        }
                        self.queue.on_success(&task).await?;
                        self.counters.recovered.fetch_add(1, Ordering::SeqCst);
                    }
                    RecoveryOutcome::NotRecoverable => {
                        self.queue.on_success(&task).await?;
                        self.counters.not_recoverable.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Ok(())
            }
        }
    }

    async fn reschedule(&self, task: &RetryTask, error: &str) -> Result<()> {
        let updated = self.queue.on_failure(task, error, Utc::now().timestamp()).await?;
        if updated.status == TaskStatus::DeadLettered {
            self.counters.dead_lettered.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counters.rescheduled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
