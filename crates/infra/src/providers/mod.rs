//! Provider adapters for the recovery cascade.
//!
//! Each adapter fronts one external service, owns its own token-bucket
//! ceiling, and performs no internal retries. A timeout, rate-limit
//! rejection, or upstream error surfaces as `ProviderOutcome::Error` and the
//! cascade moves on.

mod platform_preview;
mod post_archive;
mod removed_content;
mod reddit_url;
mod wayback;

pub use platform_preview::PlatformPreviewProvider;
pub use post_archive::PostArchiveProvider;
pub use removed_content::RemovedContentProvider;
pub use wayback::WaybackProvider;
