//! SQLite persistence: connection manager and port implementations.

mod manager;
mod recovery_cache_repository;
mod retry_queue_repository;

pub use manager::DbManager;
pub use recovery_cache_repository::SqliteRecoveryCache;
pub use retry_queue_repository::SqliteRetryQueue;
