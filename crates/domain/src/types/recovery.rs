//! Recovery cascade types: providers, outcomes, and cache entries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::impl_domain_status_conversions;

/// Normalized resource key: sha-256 of the original URL, first 16 hex
/// characters. Stable across runs, so cache rows survive restarts.
pub fn resource_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// The closed set of external recovery services, in default cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Archive-snapshot service (Wayback Machine). Most reliable, tried
    /// first.
    ArchiveSnapshot,
    /// Post/comment archive service (PullPush).
    PostArchive,
    /// Platform-native preview service. Lower fidelity but often present.
    PlatformPreview,
    /// Removed-content recovery service (Reveddit), specific to moderator
    /// deletions. Tried last.
    RemovedContentRecovery,
}

impl_domain_status_conversions!(ProviderKind {
    ArchiveSnapshot => "archive_snapshot",
    PostArchive => "post_archive",
    PlatformPreview => "platform_preview",
    RemovedContentRecovery => "removed_content_recovery"
});

impl ProviderKind {
    /// Fixed default priority order for the cascade.
    pub fn cascade_order() -> [Self; 4] {
        [
            Self::ArchiveSnapshot,
            Self::PostArchive,
            Self::PlatformPreview,
            Self::RemovedContentRecovery,
        ]
    }
}

/// Where recovered content can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// URL of the recovered copy.
    pub url: String,
    /// Which provider produced it.
    pub provider: ProviderKind,
}

/// Three-way result of a single provider attempt.
///
/// Returned, never raised: the cascade is a plain iteration over these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// The provider located a recoverable copy.
    Found(ResolvedLocation),
    /// The provider answered authoritatively that it holds nothing.
    NotFound,
    /// Timeout, 5xx, or connection failure. Counts as a miss for this
    /// provider only; the cascade continues.
    Error(String),
}

/// Outcome of one provider attempt, with how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    /// What the provider answered.
    pub outcome: ProviderOutcome,
    /// Wall-clock duration of the attempt.
    pub latency: Duration,
}

impl ProviderResult {
    /// Convenience constructor.
    pub fn new(outcome: ProviderOutcome, latency: Duration) -> Self {
        Self { outcome, latency }
    }
}

/// Final answer of the cascade for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Some provider located a copy.
    Recovered(ResolvedLocation),
    /// Every enabled provider returned `NotFound` or `Error`.
    NotRecoverable,
}

/// One durable recovery cache row.
///
/// At most one live entry exists per key. Entries are immutable once
/// written; expiry and eviction delete them, nothing updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCacheEntry {
    /// Normalized resource key, see [`resource_key`].
    pub key: String,
    /// The original unresolved URL, kept for inspection.
    pub original_url: String,
    /// Recovered location, or `None` for a cached exhaustion.
    pub recovered_url: Option<String>,
    /// Contributing provider; `None` for a cached exhaustion.
    pub provider: Option<ProviderKind>,
    /// Unix seconds when the entry was written.
    pub created_at: i64,
    /// Unix seconds past which the entry no longer counts as a hit.
    pub expires_at: i64,
}

impl RecoveryCacheEntry {
    /// Entry recording a successful recovery.
    pub fn recovered(original_url: &str, location: &ResolvedLocation, now: i64, ttl: Duration) -> Self {
        Self {
            key: resource_key(original_url),
            original_url: original_url.to_string(),
            recovered_url: Some(location.url.clone()),
            provider: Some(location.provider),
            created_at: now,
            expires_at: now + ttl.as_secs() as i64,
        }
    }

    /// Entry recording cascade exhaustion. Cached with the same uniform TTL
    /// as a success to bound repeated cost for permanently-gone content.
    pub fn not_recoverable(original_url: &str, now: i64, ttl: Duration) -> Self {
        Self {
            key: resource_key(original_url),
            original_url: original_url.to_string(),
            recovered_url: None,
            provider: None,
            created_at: now,
            expires_at: now + ttl.as_secs() as i64,
        }
    }

    /// Whether the entry has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    /// Reconstruct the cascade outcome this entry recorded.
    pub fn outcome(&self) -> RecoveryOutcome {
        match (&self.recovered_url, self.provider) {
            (Some(url), Some(provider)) => {
                RecoveryOutcome::Recovered(ResolvedLocation { url: url.clone(), provider })
            }
            _ => RecoveryOutcome::NotRecoverable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_key_is_stable_and_short() {
        let a = resource_key("https://example.com/deleted");
        let b = resource_key("https://example.com/deleted");
        let c = resource_key("https://example.com/other");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn cascade_order_is_fixed() {
        assert_eq!(
            ProviderKind::cascade_order(),
            [
                ProviderKind::ArchiveSnapshot,
                ProviderKind::PostArchive,
                ProviderKind::PlatformPreview,
                ProviderKind::RemovedContentRecovery,
            ]
        );
    }

    #[test]
    fn cache_entry_round_trips_outcome() {
        let location = ResolvedLocation {
            url: "https://web.archive.org/web/2024/https://example.com/x".to_string(),
            provider: ProviderKind::ArchiveSnapshot,
        };
        let hit = RecoveryCacheEntry::recovered(
            "https://example.com/x",
            &location,
            1_700_000_000,
            Duration::from_secs(3_600),
        );
        assert_eq!(hit.outcome(), RecoveryOutcome::Recovered(location));
        assert_eq!(hit.expires_at, 1_700_003_600);

        let miss = RecoveryCacheEntry::not_recoverable(
            "https://example.com/x",
            1_700_000_000,
            Duration::from_secs(3_600),
        );
        assert_eq!(miss.outcome(), RecoveryOutcome::NotRecoverable);
        assert!(miss.provider.is_none());
    }

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let entry = RecoveryCacheEntry::not_recoverable(
            "https://example.com/x",
            1_700_000_000,
            Duration::from_secs(60),
        );

        assert!(!entry.is_expired(1_700_000_059));
        assert!(entry.is_expired(1_700_000_060));
    }
}
