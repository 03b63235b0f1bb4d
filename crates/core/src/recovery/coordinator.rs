//! Recovery coordinator: drives the provider cascade.
//!
//! The coordinator is the only writer of the recovery cache. Every distinct
//! miss-then-resolve cycle produces exactly one cache entry, whether the
//! cascade succeeded or exhausted all enabled providers. Exhaustion is
//! cached with the same uniform TTL as a success to bound repeated cost for
//! permanently-gone content.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use stash_domain::{
    resource_key, ProviderKind, ProviderOutcome, ProvidersConfig, ProviderSettings,
    RecoveryCacheEntry, RecoveryOutcome, Result,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{RecoveryCache, RecoveryProvider};

/// Coordinates the recovery cascade across provider adapters.
pub struct RecoveryCoordinator {
    cache: Arc<dyn RecoveryCache>,
    providers: HashMap<ProviderKind, Arc<dyn RecoveryProvider>>,
    config: ProvidersConfig,
    cache_ttl: std::time::Duration,
}

impl RecoveryCoordinator {
    /// Build a coordinator over the given adapters.
    ///
    /// Adapters whose kind is disabled in `config` are kept but never
    /// invoked; the cascade order is fixed by
    /// [`ProviderKind::cascade_order`], not by the order of `providers`.
    pub fn new(
        cache: Arc<dyn RecoveryCache>,
        providers: Vec<Arc<dyn RecoveryProvider>>,
        config: ProvidersConfig,
        cache_ttl: std::time::Duration,
    ) -> Self {
        let providers = providers.into_iter().map(|p| (p.kind(), p)).collect();
        Self { cache, providers, config, cache_ttl }
    }

    fn settings_for(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::ArchiveSnapshot => &self.config.archive_snapshot,
            ProviderKind::PostArchive => &self.config.post_archive,
            ProviderKind::PlatformPreview => &self.config.platform_preview,
            ProviderKind::RemovedContentRecovery => &self.config.removed_content,
        }
    }

    /// Resolve a resource that failed to download directly.
    ///
    /// A fresh cache entry, hit or prior exhaustion, is returned with no
    /// network activity. On a miss the enabled adapters run in cascade
    /// order, each under its own bounded timeout; the first `Found`
    /// short-circuits. The outcome is written back as one cache entry.
    #[instrument(skip(self), fields(key = %resource_key(url)))]
    pub async fn resolve(&self, url: &str) -> Result<RecoveryOutcome> {
        let key = resource_key(url);

        if let Some(entry) = self.cache.get(&key).await? {
            debug!(url, "recovery cache hit");
            return Ok(entry.outcome());
        }

        let outcome = self.run_cascade(url).await;

        let now = Utc::now().timestamp();
        let entry = match &outcome {
            RecoveryOutcome::Recovered(location) => {
                info!(url, provider = %location.provider, recovered = %location.url, "content recovered");
                RecoveryCacheEntry::recovered(url, location, now, self.cache_ttl)
            }
            RecoveryOutcome::NotRecoverable => {
                info!(url, "cascade exhausted, caching negative outcome");
                RecoveryCacheEntry::not_recoverable(url, now, self.cache_ttl)
            }
        };
        self.cache.put(&entry).await?;

        Ok(outcome)
    }

    async fn run_cascade(&self, url: &str) -> RecoveryOutcome {
        for kind in ProviderKind::cascade_order() {
            let settings = self.settings_for(kind);
            if !settings.enabled {
                debug!(provider = %kind, "provider disabled, skipping");
                continue;
            }

            let Some(provider) = self.providers.get(&kind) else {
                debug!(provider = %kind, "no adapter registered, skipping");
                continue;
            };

            let result = provider.attempt(url, settings.timeout()).await;
            match result.outcome {
                ProviderOutcome::Found(location) => {
                    debug!(
                        provider = %kind,
                        latency_ms = result.latency.as_millis() as u64,
                        "provider found a copy"
                    );
                    return RecoveryOutcome::Recovered(location);
                }
                ProviderOutcome::NotFound => {
                    debug!(provider = %kind, "provider holds nothing");
                }
                ProviderOutcome::Error(message) => {
                    // Counts as a miss for this provider only.
                    warn!(provider = %kind, error = %message, "provider attempt failed");
                }
            }
        }

        RecoveryOutcome::NotRecoverable
    }
}
