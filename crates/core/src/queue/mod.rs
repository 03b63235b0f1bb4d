//! Retry queue ports and supporting types.

pub mod ports;
