//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for stash
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StashError {
    /// Durable store failure (retry queue or recovery cache).
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport failure talking to an upstream.
    #[error("Network error: {0}")]
    Network(String),

    /// A requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an invalid argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected internal failure (task panics, joins, invariants).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for stash operations
pub type Result<T> = std::result::Result<T, StashError>;
