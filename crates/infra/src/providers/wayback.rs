//! Archive-snapshot adapter backed by the Wayback Machine.
//!
//! Tries the Availability API first, then falls back to the CDX server for
//! URLs the availability index misses. Both endpoints answer for any URL,
//! which is why this adapter runs first in the cascade.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use stash_common::resilience::TokenBucket;
use stash_core::RecoveryProvider;
use stash_domain::{
    ProviderKind, ProviderOutcome, ProviderResult, ProviderSettings, ResolvedLocation,
};
use tracing::debug;

use crate::http::HttpClient;

const DEFAULT_AVAILABILITY_BASE: &str = "https://archive.org";
const DEFAULT_CDX_BASE: &str = "https://web.archive.org";
const RATE_LIMIT_BURST: u64 = 3;

/// Wayback Machine adapter.
pub struct WaybackProvider {
    http: HttpClient,
    limiter: TokenBucket,
    availability_base: String,
    cdx_base: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    closest: Option<ClosestSnapshot>,
}

#[derive(Debug, Deserialize)]
struct ClosestSnapshot {
    #[serde(default)]
    available: bool,
    url: Option<String>,
}

impl WaybackProvider {
    /// Build the adapter with its own requests-per-minute ceiling.
    pub fn new(http: HttpClient, settings: &ProviderSettings) -> Result<Self, String> {
        Ok(Self {
            http,
            limiter: TokenBucket::per_minute(settings.requests_per_minute, RATE_LIMIT_BURST)?,
            availability_base: DEFAULT_AVAILABILITY_BASE.to_string(),
            cdx_base: DEFAULT_CDX_BASE.to_string(),
        })
    }

    /// Point both endpoints at a different host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.availability_base = base.trim_end_matches('/').to_string();
        self.cdx_base = base.trim_end_matches('/').to_string();
        self
    }

    async fn lookup(&self, url: &str) -> ProviderOutcome {
        match self.check_availability(url).await {
            Ok(Some(snapshot_url)) => {
                return ProviderOutcome::Found(ResolvedLocation {
                    url: snapshot_url,
                    provider: ProviderKind::ArchiveSnapshot,
                });
            }
            Ok(None) => {
                debug!(url, "availability api holds no snapshot, trying cdx");
            }
            Err(outcome) => return outcome,
        }

        match self.check_cdx(url).await {
            Ok(Some(snapshot_url)) => ProviderOutcome::Found(ResolvedLocation {
                url: snapshot_url,
                provider: ProviderKind::ArchiveSnapshot,
            }),
            Ok(None) => ProviderOutcome::NotFound,
            Err(outcome) => outcome,
        }
    }

    async fn check_availability(
        &self,
        url: &str,
    ) -> Result<Option<String>, ProviderOutcome> {
        let endpoint = format!("{}/wayback/available", self.availability_base);
        let request = self.http.request(Method::GET, &endpoint).query(&[("url", url)]);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| ProviderOutcome::Error(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderOutcome::Error(format!(
                "availability api answered {}",
                response.status()
            )));
        }

        let body: AvailabilityResponse = response
            .json()
            .await
            .map_err(|err| ProviderOutcome::Error(format!("availability parse failure: {err}")))?;

        Ok(body
            .archived_snapshots
            .closest
            .filter(|closest| closest.available)
            .and_then(|closest| closest.url))
    }

    async fn check_cdx(&self, url: &str) -> Result<Option<String>, ProviderOutcome> {
        let endpoint = format!("{}/cdx/search/cdx", self.cdx_base);
        let request = self.http.request(Method::GET, &endpoint).query(&[
            ("url", url),
            ("output", "json"),
            ("limit", "1"),
            ("filter", "statuscode:200"),
            ("fl", "timestamp,original"),
        ]);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| ProviderOutcome::Error(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderOutcome::Error(format!(
                "cdx api answered {}",
                response.status()
            )));
        }

        let rows: Vec<Vec<String>> = response
            .json()
            .await
            .map_err(|err| ProviderOutcome::Error(format!("cdx parse failure: {err}")))?;

        // First row is the field header; a lone header means no captures.
        let Some(capture) = rows.get(1) else {
            return Ok(None);
        };
        match (capture.first(), capture.get(1)) {
            (Some(timestamp), Some(original)) => {
                Ok(Some(format!("{}/web/{timestamp}/{original}", self.cdx_base)))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl RecoveryProvider for WaybackProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ArchiveSnapshot
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
