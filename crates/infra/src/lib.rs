//! # Stash Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite implementations of the retry queue and recovery cache
//! - The HTTP client shared by the provider adapters
//! - Provider adapters for the recovery cascade
//! - The per-run dispatcher and the background cache sweeper
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `stash-core`
//! - Depends on `stash-common`, `stash-domain`, and `stash-core`
//! - Contains all "impure" code (I/O, SQLite, HTTP)

pub mod config;
pub mod database;
pub mod dispatch;
pub mod errors;
pub mod http;
pub mod logging;
pub mod providers;

// Re-export commonly used items
pub use database::{DbManager, SqliteRecoveryCache, SqliteRetryQueue};
pub use dispatch::{CacheSweeper, Dispatcher, IntakeOutcome, RunReport};
pub use errors::InfraError;
pub use http::HttpClient;
pub use providers::{
    PlatformPreviewProvider, PostArchiveProvider, RemovedContentProvider, WaybackProvider,
};
