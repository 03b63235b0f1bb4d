//! Removed-content adapter backed by Reveddit.
//!
//! Reveddit specialises in moderator-removed reddit content and works by
//! host substitution: the original thread path served from its own domain.
//! User-deleted content cannot be recovered this way, which is why this
//! adapter runs last.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use stash_common::resilience::TokenBucket;
use stash_core::RecoveryProvider;
use stash_domain::{
    ProviderKind, ProviderOutcome, ProviderResult, ProviderSettings, ResolvedLocation,
};
use tracing::debug;
use url::Url;

use super::reddit_url::is_reddit_url;
use crate::http::HttpClient;

const DEFAULT_BASE: &str = "https://www.reveddit.com";
const RATE_LIMIT_BURST: u64 = 1;

/// Reveddit adapter.
pub struct RemovedContentProvider {
    http: HttpClient,
    limiter: TokenBucket,
    base_url: String,
}

impl RemovedContentProvider {
    /// Build the adapter with its own requests-per-minute ceiling.
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Result<Self, String> {
        Ok(Self {
            http,
            limiter: TokenBucket::per_minute(settings.requests_per_minute, RATE_LIMIT_BURST)?,
            base_url: DEFAULT_BASE.to_string(),
        })
    }

    /// Point the adapter at a different host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    async fn lookup(&self, url: &str) -> ProviderOutcome {
        let Ok(parsed) = Url::parse(url) else {
            return ProviderOutcome::NotFound;
        };
        if !is_reddit_url(&parsed) {
            debug!(url, "not a reddit url, skipping removed-content lookup");
            return ProviderOutcome::NotFound;
        }

        // Same thread path, reveddit's domain.
        let mut mirror = format!("{}{}", self.base_url, parsed.path());
        if let Some(query) = parsed.query() {
            mirror.push('?');
            mirror.push_str(query);
        }

        let request = self.http.request(Method::GET, &mirror);
        let response = match self.http.send(request).await {
            Ok(response) => response,
            Err(err) => return ProviderOutcome::Error(err.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return ProviderOutcome::Found(ResolvedLocation {
                url: mirror,
                provider: ProviderKind::RemovedContentRecovery,
            });
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return ProviderOutcome::NotFound;
        }
        ProviderOutcome::Error(format!("removed-content service answered {status}"))
    }
}

#[async_trait]
impl RecoveryProvider for RemovedContentProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::RemovedContentRecovery
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> ProviderResult {
        let start = Instant::now();

        if !self.limiter.try_acquire(1) {
            return ProviderResult::new(
                ProviderOutcome::Error("rate limit exceeded".to_string()),
                start.elapsed(),
            );
        }

        let outcome = match tokio::time::timeout(timeout, self.lookup(url)).await {
            Ok(outcome) => outcome,
            Err(_) => ProviderOutcome::Error(format!("timed out after {}s", timeout.as_secs())),
        };

        ProviderResult::new(outcome, start.elapsed())
    }
}
