//! Post/comment archive adapter backed by PullPush.
//!
//! Only reddit URLs can be looked up here: the service indexes submissions
//! and comments by id, so anything else is answered `NotFound` without a
//! request.

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
use url::Url;

use super::reddit_url::{parse_target, RedditTarget};
use crate::http::HttpClient;

const DEFAULT_BASE: &str = "https://api.pullpush.io";
const RATE_LIMIT_BURST: u64 = 2;

/// PullPush archive adapter.
pub struct PostArchiveProvider {
    http: HttpClient,
    limiter: TokenBucket,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ArchivedItem>,
}

#[derive(Debug, Deserialize)]
struct ArchivedItem {
    id: Option<String>,
    subreddit: Option<String>,
    permalink: Option<String>,
}

impl PostArchiveProvider {
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
        let Some(target) = parse_target(&parsed) else {
            debug!(url, "not a reddit content url, skipping archive search");
            return ProviderOutcome::NotFound;
        };

        let (endpoint, id) = match &target {
            RedditTarget::Submission { id } => ("reddit/search/submission", id.as_str()),
            RedditTarget::Comment { id, .. } => ("reddit/search/comment", id.as_str()),
        };

        let request = self
            .http
            .request(Method::GET, format!("{}/{endpoint}", self.base_url))
            .query(&[("ids", id)]);

        let response = match self.http.send(request).await {
            Ok(response) => response,
            Err(err) => return ProviderOutcome::Error(err.to_string()),
        };

        if !response.status().is_success() {
            return ProviderOutcome::Error(format!("archive answered {}", response.status()));
        }

        let body: SearchResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => return ProviderOutcome::Error(format!("archive parse failure: {err}")),
        };

        match body.data.first().and_then(|item| recovered_url(&target, item)) {
            Some(recovered) => ProviderOutcome::Found(ResolvedLocation {
                url: recovered,
                provider: ProviderKind::PostArchive,
            }),
            None => ProviderOutcome::NotFound,
        }
    }
}

/// Rebuild a canonical reddit URL from the archived record.
fn recovered_url(target: &RedditTarget, item: &ArchivedItem) -> Option<String> {
    if let Some(permalink) = &item.permalink {
        return Some(format!("https://www.reddit.com{permalink}"));
    }

    let id = item.id.as_deref()?;
    match (target, &item.subreddit) {
        (RedditTarget::Submission { .. }, Some(subreddit)) => {
            Some(format!("https://www.reddit.com/r/{subreddit}/comments/{id}/"))
        }
        (RedditTarget::Submission { .. }, None) => {
            Some(format!("https://www.reddit.com/comments/{id}/"))
        }
        (RedditTarget::Comment { submission_id, .. }, Some(subreddit)) => Some(format!(
            "https://www.reddit.com/r/{subreddit}/comments/{submission_id}/comment/{id}/"
        )),
        (RedditTarget::Comment { submission_id, .. }, None) => {
            Some(format!("https://www.reddit.com/comments/{submission_id}/comment/{id}/"))
        }
    }
}

#[async_trait]
impl RecoveryProvider for PostArchiveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PostArchive
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
