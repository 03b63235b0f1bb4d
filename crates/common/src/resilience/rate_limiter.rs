//! Token-bucket rate limiting for upstream request ceilings.
//!
//! Allows short bursts up to a configured capacity, then refills tokens at a
//! fixed rate. Each consumer owns its own bucket, so limiting one upstream
//! never blocks another.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Clock, SystemClock};

/// Configuration for a [`TokenBucket`].
#[derive(Debug, Clone)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket can hold.
    pub capacity: u64,
    /// Number of tokens added per refill interval.
    pub refill_amount: u64,
    /// Time between refills.
    pub refill_interval: Duration,
}

impl TokenBucketConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".to_string());
        }
        if self.refill_amount == 0 {
            return Err("refill_amount must be greater than 0".to_string());
        }
        if self.refill_interval.is_zero() {
            return Err("refill_interval must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Token bucket rate limiter.
///
/// # Examples
///
/// ```rust
/// use stash_common::resilience::TokenBucket;
///
/// # fn example() -> Result<(), String> {
/// // 10 requests per minute with a burst of 3.
/// let limiter = TokenBucket::per_minute(10, 3)?;
///
/// if limiter.try_acquire(1) {
///     // proceed with the request
/// }
/// # Ok(())
/// # }
/// ```
pub struct TokenBucket<C: Clock = SystemClock> {
    config: TokenBucketConfig,
    tokens: Arc<AtomicU64>,
    last_refill: Arc<RwLock<Instant>>,
    clock: Arc<C>,
}

impl TokenBucket<SystemClock> {
    /// Create a new token bucket with the system clock.
    pub fn new(
        capacity: u64,
        refill_amount: u64,
        refill_interval: Duration,
    ) -> Result<Self, String> {
        Self::with_clock(capacity, refill_amount, refill_interval, SystemClock)
    }

    /// Bucket sized for a requests-per-minute ceiling with a burst allowance.
    ///
    /// Tokens refill one at a time at an even spacing over the minute, so the
    /// average rate never exceeds `requests_per_minute`.
    pub fn per_minute(requests_per_minute: u64, burst: u64) -> Result<Self, String> {
        if requests_per_minute == 0 {
            return Err("requests_per_minute must be greater than 0".to_string());
        }
        let interval = Duration::from_secs_f64(60.0 / requests_per_minute as f64);
        Self::new(burst.max(1), 1, interval)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a new token bucket with a custom clock.
    pub fn with_clock(
        capacity: u64,
        refill_amount: u64,
        refill_interval: Duration,
        clock: C,
    ) -> Result<Self, String> {
        let config = TokenBucketConfig { capacity, refill_amount, refill_interval };
        config.validate()?;

        Ok(Self {
            tokens: Arc::new(AtomicU64::new(capacity)),
            last_refill: Arc::new(RwLock::new(clock.now())),
            clock: Arc::new(clock),
            config,
        })
    }

    fn refill(&self) {
        let now = self.clock.now();

        let last_refill = match self.last_refill.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn!("token bucket last_refill lock poisoned");
                *poisoned.into_inner()
            }
        };

        let elapsed = now.duration_since(last_refill);
        let refills = elapsed.as_millis() / self.config.refill_interval.as_millis().max(1);

        if refills > 0 {
            let tokens_to_add = (refills as u64).saturating_mul(self.config.refill_amount);
            let current = self.tokens.load(Ordering::Acquire);
            let new_tokens = current.saturating_add(tokens_to_add).min(self.config.capacity);

            self.tokens.store(new_tokens, Ordering::Release);

            if let Ok(mut guard) = self.last_refill.write() {
                *guard = now;
            }

            debug!(added = tokens_to_add, available = new_tokens, "refilled tokens");
        }
    }

    /// Try to acquire the specified number of tokens.
    ///
    /// Returns `true` if the tokens were acquired, `false` if the bucket does
    /// not hold enough.
    pub fn try_acquire(&self, tokens: u64) -> bool {
        self.refill();

        let mut current = self.tokens.load(Ordering::Acquire);

        loop {
            if current < tokens {
                debug!(available = current, requested = tokens, "rate limit reached");
                return false;
            }

            let new_value = current - tokens;
            match self.tokens.compare_exchange_weak(
                current,
                new_value,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Get the current number of available tokens.
    pub fn available_tokens(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Acquire)
    }

    /// How long until at least one token will be available.
    ///
    /// Returns [`Duration::ZERO`] when a token is already available. The
    /// estimate is conservative: callers should re-check with
    /// [`Self::try_acquire`] after sleeping.
    pub fn time_until_available(&self) -> Duration {
        if self.available_tokens() > 0 {
            return Duration::ZERO;
        }

        let last_refill = match self.last_refill.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };

        let elapsed = self.clock.now().duration_since(last_refill);
        self.config.refill_interval.saturating_sub(elapsed)
    }

    /// Reset the limiter to full capacity.
    pub fn reset(&self) {
        self.tokens.store(self.config.capacity, Ordering::Release);
        if let Ok(mut guard) = self.last_refill.write() {
            *guard = self.clock.now();
        }
    }
}

impl<C: Clock> Clone for TokenBucket<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            tokens: Arc::clone(&self.tokens),
            last_refill: Arc::clone(&self.last_refill),
            clock: Arc::clone(&self.clock),
        }
    }
}
