//! Resilience primitives shared by the provider adapters.
//!
//! Each external recovery service enforces its own request ceiling through a
//! [`TokenBucket`] local to that adapter, so one saturated upstream never
//! stalls the others. The [`Clock`] abstraction keeps the bucket testable
//! without real delays.

mod clock;
mod rate_limiter;

pub use clock::{Clock, MockClock, SystemClock};
pub use rate_limiter::{TokenBucket, TokenBucketConfig};
