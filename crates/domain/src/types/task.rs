//! Retry queue task types and scheduling arithmetic.
//!
//! A [`RetryTask`] records one failed acquisition and carries everything the
//! dispatcher needs to schedule re-attempts: priority derived from the
//! estimated payload size, exponential backoff state, and the two
//! dead-letter ceilings (attempt count and wall-clock age). The arithmetic
//! lives here so the SQLite repository stays a thin persistence layer.

use serde::{Deserialize, Serialize};

use crate::config::RetryPolicy;
use crate::constants::{HIGH_PRIORITY_MAX_BYTES, MEDIUM_PRIORITY_MAX_BYTES};
use crate::impl_domain_status_conversions;

/// Priority tier assigned at creation from the estimated payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Payloads under 1 MB; retried first and soonest.
    High,
    /// Payloads under 10 MB.
    Medium,
    /// Payloads of 10 MB and above.
    Low,
}

impl_domain_status_conversions!(TaskPriority {
    High => "high",
    Medium => "medium",
    Low => "low"
});

impl TaskPriority {
    /// Derive the tier from the estimated payload size in bytes.
    pub fn from_estimated_size(bytes: u64) -> Self {
        if bytes < HIGH_PRIORITY_MAX_BYTES {
            Self::High
        } else if bytes < MEDIUM_PRIORITY_MAX_BYTES {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Numeric rank used for ordering in SQL (1 = highest).
    pub fn rank(self) -> i32 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Rank back to tier; unknown ranks fall back to medium.
    pub fn from_rank(rank: i32) -> Self {
        match rank {
            1 => Self::High,
            3 => Self::Low,
            _ => Self::Medium,
        }
    }

    /// Base delay before the first re-attempt, in seconds.
    pub fn base_delay_secs(self, policy: &RetryPolicy) -> u64 {
        match self {
            Self::High => policy.base_retry_delay_high_secs,
            Self::Medium => policy.base_retry_delay_medium_secs,
            Self::Low => policy.base_retry_delay_low_secs,
        }
    }
}

/// Lifecycle state of a retry task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its `next_attempt_at` to come due.
    Pending,
    /// Claimed by a dispatcher run.
    InProgress,
    /// Completed; rows in this state are deleted rather than kept.
    Succeeded,
    /// Terminal. Retained for manual inspection, never retried
    /// automatically.
    DeadLettered,
}

impl_domain_status_conversions!(TaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Succeeded => "succeeded",
    DeadLettered => "dead_lettered"
});

impl TaskStatus {
    /// Whether the task can still be scheduled.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// The kind of acquisition that failed. Together with the target URL it
/// forms the task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Downloading a media file attached to an item.
    MediaDownload,
    /// Fetching the textual content of an item.
    ContentFetch,
}

impl_domain_status_conversions!(OperationKind {
    MediaDownload => "media_download",
    ContentFetch => "content_fetch"
});

/// Outcome of recording a failed attempt against a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The task was rescheduled with increased backoff.
    Rescheduled,
    /// A retry or time ceiling tripped; the task is now terminal.
    DeadLettered,
}

/// One persisted entry in the retry queue.
///
/// Identity is `(url, operation)`; re-failing the same target updates the
/// existing task rather than duplicating it. All timestamps are Unix
/// seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryTask {
    /// Target resource.
    pub url: String,
    /// Which acquisition failed.
    pub operation: OperationKind,
    /// Tier fixed at creation from `estimated_size`; never demoted.
    pub priority: TaskPriority,
    /// Estimated payload size in bytes at creation time.
    pub estimated_size: u64,
    /// Number of re-attempts recorded so far.
    pub attempt_count: u32,
    /// When the first failure was observed.
    pub first_failure_at: i64,
    /// Earliest time the next attempt may run. Non-decreasing across
    /// successive failures.
    pub next_attempt_at: i64,
    /// When the most recent attempt ran, if any.
    pub last_attempt_at: Option<i64>,
    /// Message from the most recent failure.
    pub last_error: Option<String>,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// When the task was dead-lettered, if it was.
    pub dead_lettered_at: Option<i64>,
}

impl RetryTask {
    /// Create a fresh pending task for a first failure observed at `now`.
    pub fn new(
        url: impl Into<String>,
        operation: OperationKind,
        estimated_size: u64,
        error: impl Into<String>,
        now: i64,
        policy: &RetryPolicy,
    ) -> Self {
        let priority = TaskPriority::from_estimated_size(estimated_size);
        let initial_delay = priority.base_delay_secs(policy) as i64;

        Self {
            url: url.into(),
            operation,
            priority,
            estimated_size,
            attempt_count: 0,
            first_failure_at: now,
            next_attempt_at: now + initial_delay,
            last_attempt_at: None,
            last_error: Some(error.into()),
            status: TaskStatus::Pending,
            dead_lettered_at: None,
        }
    }

    /// Backoff delay in seconds for the current `attempt_count`.
    ///
    /// `exponential_base_delay * 2^attempt_count`, capped at
    /// `max_retry_delay`. With the shipped defaults the cap engages from
    /// the eleventh attempt onward.
    pub fn backoff_delay_secs(&self, policy: &RetryPolicy) -> u64 {
        if self.attempt_count == 0 {
            return self.priority.base_delay_secs(policy);
        }

        let shift = u64::from(self.attempt_count.min(62));
        let uncapped = policy.exponential_base_delay_secs.saturating_mul(1u64 << shift);
        uncapped.min(policy.max_retry_delay_secs)
    }

    /// Whether a dead-letter ceiling has tripped.
    ///
    /// Either ceiling alone is sufficient: the attempt count strictly
    /// exceeding `max_retries`, or the wall-clock age since the first
    /// failure exceeding the dead-letter threshold.
    pub fn should_dead_letter(&self, now: i64, policy: &RetryPolicy) -> bool {
        self.attempt_count > policy.max_retries
            || (now - self.first_failure_at) > policy.dead_letter_threshold_secs()
    }

    /// Record a failed attempt at `now` and transition the task.
    ///
    /// Increments the attempt count, then either dead-letters the task or
    /// reschedules it with exponential backoff. `next_attempt_at` never
    /// decreases.
    pub fn record_failure(
        &mut self,
        now: i64,
        error: impl Into<String>,
        policy: &RetryPolicy,
    ) -> FailureDisposition {
        self.attempt_count += 1;
        self.last_attempt_at = Some(now);
        self.last_error = Some(error.into());

        if self.should_dead_letter(now, policy) {
            self.status = TaskStatus::DeadLettered;
            self.dead_lettered_at = Some(now);
            return FailureDisposition::DeadLettered;
        }

        let delay = self.backoff_delay_secs(policy) as i64;
        self.next_attempt_at = self.next_attempt_at.max(now + delay);
        self.status = TaskStatus::Pending;
        FailureDisposition::Rescheduled
    }

    /// Whether this task is due at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.status == TaskStatus::Pending && self.next_attempt_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn priority_from_estimated_size() {
        assert_eq!(TaskPriority::from_estimated_size(500_000), TaskPriority::High);
        assert_eq!(TaskPriority::from_estimated_size(999_999), TaskPriority::High);
        assert_eq!(TaskPriority::from_estimated_size(1_000_000), TaskPriority::Medium);
        assert_eq!(TaskPriority::from_estimated_size(9_999_999), TaskPriority::Medium);
        assert_eq!(TaskPriority::from_estimated_size(10_000_000), TaskPriority::Low);
    }

    #[test]
    fn new_task_schedules_priority_base_delay() {
        let now = 1_700_000_000;
        let task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "connection reset",
            now,
            &policy(),
        );

        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.attempt_count, 0);
        assert_eq!(task.next_attempt_at, now + 5);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            1_700_000_000,
            &policy(),
        );

        task.attempt_count = 1;
        assert_eq!(task.backoff_delay_secs(&policy()), 120);

        task.attempt_count = 2;
        assert_eq!(task.backoff_delay_secs(&policy()), 240);

        task.attempt_count = 5;
        assert_eq!(task.backoff_delay_secs(&policy()), 1_920);
    }

    #[test]
    fn backoff_caps_at_max_retry_delay() {
        // base 60s, eleventh attempt would be 122,880s uncapped
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            1_700_000_000,
            &policy(),
        );
        task.attempt_count = 11;

        assert_eq!(task.backoff_delay_secs(&policy()), 86_400);
    }

    #[test]
    fn record_failure_reschedules_under_limits() {
        let now = 1_700_000_000;
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            now,
            &policy(),
        );

        let disposition = task.record_failure(now + 10, "timeout", &policy());

        assert_eq!(disposition, FailureDisposition::Rescheduled);
        assert_eq!(task.attempt_count, 1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.next_attempt_at, now + 10 + 120);
        assert_eq!(task.last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn next_attempt_at_is_non_decreasing() {
        let now = 1_700_000_000;
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            now,
            &policy(),
        );

        let mut previous = task.next_attempt_at;
        for attempt in 0..4 {
            task.record_failure(now + attempt, "timeout", &policy());
            assert!(task.next_attempt_at >= previous);
            previous = task.next_attempt_at;
        }
    }

    #[test]
    fn attempt_ceiling_dead_letters() {
        let now = 1_700_000_000;
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            now,
            &policy(),
        );
        task.attempt_count = 5; // max_retries

        let disposition = task.record_failure(now + 60, "timeout", &policy());

        assert_eq!(disposition, FailureDisposition::DeadLettered);
        assert_eq!(task.status, TaskStatus::DeadLettered);
        assert_eq!(task.attempt_count, 6);
        assert_eq!(task.dead_lettered_at, Some(now + 60));
    }

    #[test]
    fn attempt_count_never_exceeds_max_while_pending() {
        let now = 1_700_000_000;
        let retry_policy = policy();
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            now,
            &retry_policy,
        );

        for attempt in 0..20 {
            task.record_failure(now + attempt, "timeout", &retry_policy);
            if task.status == TaskStatus::Pending {
                assert!(task.attempt_count <= retry_policy.max_retries);
            } else {
                break;
            }
        }
        assert_eq!(task.status, TaskStatus::DeadLettered);
    }

    #[test]
    fn time_ceiling_trips_before_count_ceiling() {
        // First failure eight days ago, threshold seven days, only two
        // attempts recorded against a ceiling of five.
        let first_failure = 1_700_000_000;
        let now = first_failure + 8 * 86_400;
        let mut task = RetryTask::new(
            "https://example.com/a.jpg",
            OperationKind::MediaDownload,
            500_000,
            "err",
            first_failure,
            &policy(),
        );
        task.attempt_count = 2;

        let disposition = task.record_failure(now, "timeout", &policy());

        assert_eq!(disposition, FailureDisposition::DeadLettered);
        assert_eq!(task.status, TaskStatus::DeadLettered);
    }
}
