//! # Stash Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the durable stores, the provider
//!   adapters, and the external fetch/persist collaborators
//! - The recovery coordinator driving the provider cascade
//!
//! ## Architecture Principles
//! - Only depends on `stash-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod queue;
pub mod recovery;

// Re-export specific items to avoid ambiguity
pub use queue::ports::{ContentFetcher, FetchError, FetchedContent, QueueStats, RetryQueue};
pub use recovery::ports::{RecoveredContentSink, RecoveryCache, RecoveryProvider};
pub use recovery::RecoveryCoordinator;
