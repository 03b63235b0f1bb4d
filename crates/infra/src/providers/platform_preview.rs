//! Platform-preview adapter backed by reddit's preview CDN.
//!
//! Previews are lower fidelity than the original media but frequently
//! outlive it. The adapter probes candidate preview URLs with HEAD-style
//! GETs and reports the first one that answers 200.

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

use crate::http::HttpClient;

const PREVIEW_HOSTS: [&str; 2] = ["preview.redd.it", "external-preview.redd.it"];
const RATE_LIMIT_BURST: u64 = 5;

/// Reddit preview CDN adapter.
pub struct PlatformPreviewProvider {
    http: HttpClient,
    limiter: TokenBucket,
    preview_bases: Vec<String>,
}

impl PlatformPreviewProvider {
    /// Build the adapter with its own requests-per-minute ceiling.
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Result<Self, String> {
        Ok(Self {
            http,
            limiter: TokenBucket::per_minute(settings.requests_per_minute, RATE_LIMIT_BURST)?,
            preview_bases: PREVIEW_HOSTS.iter().map(|host| format!("https://{host}")).collect(),
        })
    }

    /// Replace the CDN hosts with a single test host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.preview_bases = vec![base.trim_end_matches('/').to_string()];
        self
    }

    async fn lookup(&self, url: &str) -> ProviderOutcome {
        // A preview URL itself just needs verifying.
        if is_preview_url(url) {
            return match self.verify(url).await {
                Ok(true) => found(url),
                Ok(false) => ProviderOutcome::NotFound,
                Err(outcome) => outcome,
            };
        }

        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        for base in &self.preview_bases {
            let candidate = format!("{base}/{encoded}");
            match self.verify(&candidate).await {
                Ok(true) => return found(&candidate),
                Ok(false) => debug!(candidate, "no preview at candidate url"),
                Err(outcome) => return outcome,
            }
        }

        ProviderOutcome::NotFound
    }

    async fn verify(&self, candidate: &str) -> Result<bool, ProviderOutcome> {
        let request = self.http.request(Method::GET, candidate);
        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| ProviderOutcome::Error(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Ok(false);
        }
        Err(ProviderOutcome::Error(format!("preview cdn answered {status}")))
    }
}

fn found(url: &str) -> ProviderOutcome {
    ProviderOutcome::Found(ResolvedLocation {
        url: url.to_string(),
        provider: ProviderKind::PlatformPreview,
    })
}

fn is_preview_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_ascii_lowercase()))
        .is_some_and(|host| PREVIEW_HOSTS.contains(&host.as_str()))
}

#[async_trait]
impl RecoveryProvider for PlatformPreviewProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PlatformPreview
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
