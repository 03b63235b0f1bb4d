//! Recovery cascade: ports and the coordinator.

pub mod coordinator;
pub mod ports;

pub use coordinator::RecoveryCoordinator;
