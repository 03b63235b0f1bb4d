//! # Stash Domain
//!
//! Business domain types for the resilient content acquisition engine.
//!
//! This crate contains:
//! - Retry queue task types and their scheduling arithmetic
//! - Recovery cascade types (providers, outcomes, cache entries)
//! - Configuration structures and defaults
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other stash crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
