//! SQLite-backed implementation of the retry queue port.
//!
//! Scheduling arithmetic lives on [`RetryTask`]; this module is a thin
//! persistence layer. Every mutation runs as a single statement or a single
//! transaction so an aborted run never leaves a torn record.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, Row};
use stash_core::{QueueStats, RetryQueue};
use stash_domain::{
    OperationKind, Result as DomainResult, RetryPolicy, RetryTask, StashError, TaskPriority,
    TaskStatus,
};
use tokio::task;
use tracing::{debug, warn};

use super::manager::{map_sql_error, DbManager};

/// SQLite-backed retry queue.
pub struct SqliteRetryQueue {
    db: Arc<DbManager>,
    policy: RetryPolicy,
}

impl SqliteRetryQueue {
    /// Construct a queue backed by the shared database manager.
    pub fn new(db: Arc<DbManager>, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    fn find_task(
        conn: &Connection,
        url: &str,
        operation: OperationKind,
    ) -> DomainResult<Option<RetryTask>> {
        let mut stmt = conn.prepare(TASK_SELECT_SQL).map_err(map_sql_error)?;
        let mut rows = stmt
            .query_map(rusqlite::params![url, operation.to_string()], map_task_row)
            .map_err(map_sql_error)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(map_sql_error)?)),
            None => Ok(None),
        }
    }

    fn write_task(conn: &Connection, task: &RetryTask) -> DomainResult<()> {
        conn.execute(
            TASK_UPSERT_SQL,
            rusqlite::params![
                task.url,
                task.operation.to_string(),
                task.priority.rank(),
                task.estimated_size,
                task.attempt_count,
                task.first_failure_at,
                task.next_attempt_at,
                task.last_attempt_at,
                task.last_error,
                task.status.to_string(),
                task.dead_lettered_at,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }
}

#[async_trait]
impl RetryQueue for SqliteRetryQueue {
    async fn enqueue(
        &self,
        url: &str,
        operation: OperationKind,
        estimated_size: u64,
        error: &str,
    ) -> DomainResult<RetryTask> {
        let db = Arc::clone(&self.db);
        let policy = self.policy.clone();
        let url = url.to_string();
        let error = error.to_string();

        task::spawn_blocking(move || -> DomainResult<RetryTask> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            // Identity is (url, operation): a second failure for the same
            // target returns the existing row unchanged. Dead-lettered rows
            // stay terminal until an operator requeues them.
            if let Some(existing) = Self::find_task(&tx, &url, operation)? {
                tx.commit().map_err(map_sql_error)?;
                debug!(url = %existing.url, status = %existing.status, "task already queued");
                return Ok(existing);
            }

            let task = RetryTask::new(
                url,
                operation,
                estimated_size,
                error,
                Utc::now().timestamp(),
                &policy,
            );
            Self::write_task(&tx, &task)?;
            tx.commit().map_err(map_sql_error)?;

            debug!(url = %task.url, priority = %task.priority, "task enqueued");
            Ok(task)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dequeue_due(&self, now: i64, limit: usize) -> DomainResult<Vec<RetryTask>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<RetryTask>> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let mut tasks = {
                let mut stmt = tx.prepare(DUE_SELECT_SQL).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(rusqlite::params![now, usize_to_i64(limit)], map_task_row)
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)?
            };

            // Claim atomically with the read so two overlapping runs never
            // hand out the same task.
            for task in &mut tasks {
                tx.execute(
                    CLAIM_SQL,
                    rusqlite::params![now, task.url, task.operation.to_string()],
                )
                .map_err(map_sql_error)?;
                task.status = TaskStatus::InProgress;
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(tasks)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn on_success(&self, task: &RetryTask) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let url = task.url.clone();
        let operation = task.operation;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(DELETE_SQL, rusqlite::params![url, operation.to_string()])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn on_failure(
        &self,
        task: &RetryTask,
        error: &str,
        now: i64,
    ) -> DomainResult<RetryTask> {
        let db = Arc::clone(&self.db);
        let policy = self.policy.clone();
        let mut updated = task.clone();
        let error = error.to_string();

        task::spawn_blocking(move || -> DomainResult<RetryTask> {
            updated.record_failure(now, error, &policy);

            let conn = db.get_connection()?;
            conn.execute(
                FAILURE_UPDATE_SQL,
                rusqlite::params![
                    updated.attempt_count,
                    updated.next_attempt_at,
                    updated.last_attempt_at,
                    updated.last_error,
                    updated.status.to_string(),
                    updated.dead_lettered_at,
                    updated.url,
                    updated.operation.to_string(),
                ],
            )
            .map_err(map_sql_error)?;

            if updated.status == TaskStatus::DeadLettered {
                warn!(
                    url = %updated.url,
                    attempts = updated.attempt_count,
                    "task dead-lettered"
                );
            }

            Ok(updated)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn release(&self, task: &RetryTask) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let url = task.url.clone();
        let operation = task.operation;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(RELEASE_SQL, rusqlite::params![url, operation.to_string()])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn dead_lettered(&self, limit: usize) -> DomainResult<Vec<RetryTask>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<RetryTask>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(DEAD_LETTER_SELECT_SQL).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(rusqlite::params![usize_to_i64(limit)], map_task_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn requeue_dead_lettered(
        &self,
        url: &str,
        operation: OperationKind,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let policy = self.policy.clone();
        let url = url.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let Some(existing) = Self::find_task(&tx, &url, operation)? else {
                return Ok(false);
            };
            if existing.status != TaskStatus::DeadLettered {
                return Ok(false);
            }

            let now = Utc::now().timestamp();
            let delay = existing.priority.base_delay_secs(&policy) as i64;
            tx.execute(
                REQUEUE_SQL,
                rusqlite::params![now, now + delay, url, operation.to_string()],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            debug!(url = %url, "dead-lettered task requeued");
            Ok(true)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reclaim_stale(&self, now: i64) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let cutoff = now - self.policy.stale_in_progress_secs as i64;

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let reclaimed = conn
                .execute(RECLAIM_SQL, rusqlite::params![cutoff])
                .map_err(map_sql_error)?;

            if reclaimed > 0 {
                warn!(reclaimed, "reclaimed stale in-progress tasks");
            }
            Ok(reclaimed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn stats(&self, now: i64) -> DomainResult<QueueStats> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<QueueStats> {
            let conn = db.get_connection()?;
            conn.query_row(STATS_SQL, rusqlite::params![now], |row| {
                Ok(QueueStats {
                    pending: row.get(0)?,
                    in_progress: row.get(1)?,
                    dead_lettered: row.get(2)?,
                    ready: row.get(3)?,
                })
            })
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

const TASK_SELECT_SQL: &str = "SELECT url, operation, priority, estimated_size, attempt_count,
        first_failure_at, next_attempt_at, last_attempt_at, last_error, status, dead_lettered_at
    FROM retry_queue
    WHERE url = ?1 AND operation = ?2";

const TASK_UPSERT_SQL: &str = "INSERT OR REPLACE INTO retry_queue (
        url, operation, priority, estimated_size, attempt_count, first_failure_at,
        next_attempt_at, last_attempt_at, last_error, status, dead_lettered_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const DUE_SELECT_SQL: &str = "SELECT url, operation, priority, estimated_size, attempt_count,
        first_failure_at, next_attempt_at, last_attempt_at, last_error, status, dead_lettered_at
    FROM retry_queue
    WHERE status = 'pending' AND next_attempt_at <= ?1
    ORDER BY priority ASC, next_attempt_at ASC
    LIMIT ?2";

const CLAIM_SQL: &str = "UPDATE retry_queue
    SET status = 'in_progress', claimed_at = ?1
    WHERE url = ?2 AND operation = ?3";

const DELETE_SQL: &str = "DELETE FROM retry_queue WHERE url = ?1 AND operation = ?2";

const RELEASE_SQL: &str = "UPDATE retry_queue
    SET status = 'pending', claimed_at = NULL
    WHERE url = ?1 AND operation = ?2 AND status = 'in_progress'";

const FAILURE_UPDATE_SQL: &str = "UPDATE retry_queue
    SET attempt_count = ?1, next_attempt_at = ?2, last_attempt_at = ?3, last_error = ?4,
        status = ?5, dead_lettered_at = ?6, claimed_at = NULL
    WHERE url = ?7 AND operation = ?8";

const DEAD_LETTER_SELECT_SQL: &str =
    "SELECT url, operation, priority, estimated_size, attempt_count,
        first_failure_at, next_attempt_at, last_attempt_at, last_error, status, dead_lettered_at
    FROM retry_queue
    WHERE status = 'dead_lettered'
    ORDER BY dead_lettered_at DESC
    LIMIT ?1";

const REQUEUE_SQL: &str = "UPDATE retry_queue
    SET status = 'pending', attempt_count = 0, first_failure_at = ?1, next_attempt_at = ?2,
        dead_lettered_at = NULL, claimed_at = NULL
    WHERE url = ?3 AND operation = ?4";

const RECLAIM_SQL: &str = "UPDATE retry_queue
    SET status = 'pending', claimed_at = NULL
    WHERE status = 'in_progress' AND claimed_at IS NOT NULL AND claimed_at <= ?1";

const STATS_SQL: &str = "SELECT
        COUNT(CASE WHEN status = 'pending' THEN 1 END),
        COUNT(CASE WHEN status = 'in_progress' THEN 1 END),
        COUNT(CASE WHEN status = 'dead_lettered' THEN 1 END),
        COUNT(CASE WHEN status = 'pending' AND next_attempt_at <= ?1 THEN 1 END)
    FROM retry_queue";

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<RetryTask> {
    let url: String = row.get(0)?;
    let operation_raw: String = row.get(1)?;
    let status_raw: String = row.get(9)?;

    Ok(RetryTask {
        operation: parse_operation(&url, &operation_raw),
        priority: TaskPriority::from_rank(row.get(2)?),
        estimated_size: row.get(3)?,
        attempt_count: row.get(4)?,
        first_failure_at: row.get(5)?,
        next_attempt_at: row.get(6)?,
        last_attempt_at: row.get(7)?,
        last_error: row.get(8)?,
        status: parse_status(&url, &status_raw),
        dead_lettered_at: row.get(10)?,
        url,
    })
}

fn parse_operation(url: &str, raw: &str) -> OperationKind {
    match raw.parse::<OperationKind>() {
        Ok(operation) => operation,
        Err(err) => {
            warn!(
                url = %url,
                raw_operation = %raw,
                error = %err,
                "invalid operation kind in retry queue row, defaulting to content fetch"
            );
            OperationKind::ContentFetch
        }
    }
}

fn parse_status(url: &str, raw: &str) -> TaskStatus {
    match raw.parse::<TaskStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(
                url = %url,
                raw_status = %raw,
                error = %err,
                "invalid task status in retry queue row, defaulting to pending"
            );
            TaskStatus::Pending
        }
    }
}

fn map_join_error(err: task::JoinError) -> StashError {
    if err.is_cancelled() {
        StashError::Internal("retry queue task cancelled".into())
    } else {
        StashError::Internal(format!("retry queue task panic: {err}"))
    }
}

fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn setup_queue() -> (SqliteRetryQueue, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let manager = Arc::new(manager);
        let queue = SqliteRetryQueue::new(Arc::clone(&manager), RetryPolicy::default());

        (queue, manager, temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_creates_pending_task_with_base_delay() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "reset")
            .await
            .expect("enqueue succeeds");

        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempt_count, 0);
        assert_eq!(task.next_attempt_at, task.first_failure_at + 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_is_idempotent_per_identity() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let url = "https://example.com/a.jpg";

        let first = queue
            .enqueue(url, OperationKind::MediaDownload, 500_000, "reset")
            .await
            .expect("first enqueue");
        let second = queue
            .enqueue(url, OperationKind::MediaDownload, 500_000, "timeout")
            .await
            .expect("second enqueue");

        assert_eq!(first, second);

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn same_url_different_operation_is_a_distinct_task() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let url = "https://example.com/post";

        queue.enqueue(url, OperationKind::MediaDownload, 500_000, "e").await.expect("enqueue");
        queue.enqueue(url, OperationKind::ContentFetch, 500_000, "e").await.expect("enqueue");

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dequeue_due_respects_limit_and_marks_in_progress() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        for i in 0..5 {
            queue
                .enqueue(
                    &format!("https://example.com/{i}.jpg"),
                    OperationKind::MediaDownload,
                    500_000,
                    "e",
                )
                .await
                .expect("enqueue");
        }

        let far_future = Utc::now().timestamp() + 3_600;
        let batch = queue.dequeue_due(far_future, 3).await.expect("dequeue");

        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|t| t.status == TaskStatus::InProgress));

        let stats = queue.stats(far_future).await.expect("stats");
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.in_progress, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dequeue_skips_tasks_not_yet_due() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");

        // One second before the scheduled attempt: nothing is due.
        let batch = queue.dequeue_due(task.next_attempt_at - 1, 10).await.expect("dequeue");
        assert!(batch.is_empty());

        let batch = queue.dequeue_due(task.next_attempt_at, 10).await.expect("dequeue");
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dequeue_orders_by_priority_then_schedule() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        // Low priority enqueued first, high priority second.
        queue
            .enqueue("https://example.com/big.mp4", OperationKind::MediaDownload, 50_000_000, "e")
            .await
            .expect("enqueue low");
        queue
            .enqueue("https://example.com/small.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue high");

        let far_future = Utc::now().timestamp() + 3_600;
        let batch = queue.dequeue_due(far_future, 10).await.expect("dequeue");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].priority, TaskPriority::High);
        assert_eq!(batch[1].priority, TaskPriority::Low);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn on_success_deletes_the_row() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        queue.on_success(&task).await.expect("success recorded");

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_progress, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn on_failure_reschedules_with_backoff() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");

        let now = task.first_failure_at + 10;
        let updated = queue.on_failure(&task, "timeout", now).await.expect("failure recorded");

        assert_eq!(updated.attempt_count, 1);
        assert_eq!(updated.status, TaskStatus::Pending);
        assert_eq!(updated.next_attempt_at, now + 120);
        assert_eq!(updated.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn exhausted_task_is_dead_lettered_and_retained() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let mut task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");

        let mut now = task.first_failure_at;
        while task.status != TaskStatus::DeadLettered {
            now += 1;
            task = queue.on_failure(&task, "timeout", now).await.expect("failure recorded");
        }

        assert_eq!(task.attempt_count, 6); // max_retries + 1

        let dead = queue.dead_lettered(10).await.expect("dead letter listing");
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].url, task.url);

        // Dead-lettered rows never come back through dequeue.
        let batch = queue.dequeue_due(i64::MAX, 10).await.expect("dequeue");
        assert!(batch.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_against_dead_lettered_identity_leaves_it_terminal() {
        let (queue, _manager, _temp_dir) = setup_queue().await;
        let url = "https://example.com/a.jpg";

        let mut task = queue
            .enqueue(url, OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        let mut now = task.first_failure_at;
        while task.status != TaskStatus::DeadLettered {
            now += 1;
            task = queue.on_failure(&task, "timeout", now).await.expect("failure recorded");
        }

        let again = queue
            .enqueue(url, OperationKind::MediaDownload, 500_000, "fresh failure")
            .await
            .expect("enqueue");

        assert_eq!(again, task);
        assert_eq!(again.status, TaskStatus::DeadLettered);

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.dead_lettered, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requeue_dead_lettered_resets_the_task() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let mut task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        let mut now = task.first_failure_at;
        while task.status != TaskStatus::DeadLettered {
            now += 1;
            task = queue.on_failure(&task, "timeout", now).await.expect("failure recorded");
        }

        let requeued = queue
            .requeue_dead_lettered(&task.url, task.operation)
            .await
            .expect("requeue succeeds");
        assert!(requeued);

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.dead_lettered, 0);

        let batch = queue.dequeue_due(i64::MAX, 10).await.expect("dequeue");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].attempt_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn requeue_returns_false_for_live_or_missing_tasks() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        let requeued = queue
            .requeue_dead_lettered("https://example.com/missing", OperationKind::MediaDownload)
            .await
            .expect("requeue call succeeds");
        assert!(!requeued);

        let task = queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        let requeued = queue
            .requeue_dead_lettered(&task.url, task.operation)
            .await
            .expect("requeue call succeeds");
        assert!(!requeued);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn release_returns_claimed_task_without_an_attempt() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        let batch = queue.dequeue_due(i64::MAX, 10).await.expect("dequeue");
        assert_eq!(batch.len(), 1);

        queue.release(&batch[0]).await.expect("release succeeds");

        let stats = queue.stats(i64::MAX).await.expect("stats");
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 0);

        let again = queue.dequeue_due(i64::MAX, 10).await.expect("dequeue");
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].attempt_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reclaim_stale_returns_abandoned_tasks_to_pending() {
        let (queue, _manager, _temp_dir) = setup_queue().await;

        queue
            .enqueue("https://example.com/a.jpg", OperationKind::MediaDownload, 500_000, "e")
            .await
            .expect("enqueue");
        let claim_time = Utc::now().timestamp() + 3_600;
        let batch = queue.dequeue_due(claim_time, 10).await.expect("dequeue");
        assert_eq!(batch.len(), 1);

        // Within the staleness window nothing is reclaimed.
        let reclaimed = queue.reclaim_stale(claim_time).await.expect("reclaim");
        assert_eq!(reclaimed, 0);

        // Past the window the claim is released.
        let much_later = claim_time + 7_200;
        let reclaimed = queue.reclaim_stale(much_later).await.expect("reclaim");
        assert_eq!(reclaimed, 1);

        let stats = queue.stats(much_later).await.expect("stats");
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.in_progress, 0);
    }
}
