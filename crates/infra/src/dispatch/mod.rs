//! Run orchestration: the retry-queue dispatcher and the cache sweeper.

mod dispatcher;
mod sweeper;

pub use dispatcher::{Dispatcher, IntakeOutcome, RunReport};
pub use sweeper::{CacheSweeper, SweepStats};
