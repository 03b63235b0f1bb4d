//! Domain data types for the acquisition engine.

pub mod recovery;
pub mod task;

pub use recovery::{
    resource_key, ProviderKind, ProviderOutcome, ProviderResult, RecoveryCacheEntry,
    RecoveryOutcome, ResolvedLocation,
};
pub use task::{FailureDisposition, OperationKind, RetryTask, TaskPriority, TaskStatus};
