//! Tracing setup for binaries and long-running services.
//!
//! Libraries in this workspace only emit `tracing` events; installing a
//! subscriber is the entry point's job and happens exactly once.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise `info` for this
/// workspace's crates and `warn` for everything else. Calling this twice
/// is a no-op rather than a panic, so tests can call it freely.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,stash_core=info,stash_infra=info"));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
