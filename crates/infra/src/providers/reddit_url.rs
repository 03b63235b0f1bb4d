//! Reddit URL parsing shared by the reddit-specific adapters.

use url::Url;

/// What a reddit URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedditTarget {
    /// A submission, identified by its base-36 id.
    Submission {
        /// Base-36 submission id.
        id: String,
    },
    /// A comment, identified by its own id and the parent submission's id.
    Comment {
        /// Base-36 comment id.
        id: String,
        /// Base-36 id of the submission the comment belongs to.
        submission_id: String,
    },
}

/// Whether the URL belongs to reddit at all.
pub fn is_reddit_url(url: &Url) -> bool {
    url.host_str()
        .map(|host| {
            let host = host.to_ascii_lowercase();
            host == "redd.it" || host == "reddit.com" || host.ends_with(".reddit.com")
        })
        .unwrap_or(false)
}

/// Parse a reddit URL into its target, or `None` for URLs this archive
/// cannot identify (non-reddit hosts, media CDN links, malformed paths).
pub fn parse_target(url: &Url) -> Option<RedditTarget> {
    if !is_reddit_url(url) {
        return None;
    }

    let segments: Vec<&str> =
        url.path_segments().map(|s| s.filter(|p| !p.is_empty()).collect()).unwrap_or_default();

    // Short links: https://redd.it/<id>
    if url.host_str().is_some_and(|h| h.eq_ignore_ascii_case("redd.it")) {
        return segments.first().filter(|id| is_base36(id)).map(|id| RedditTarget::Submission {
            id: id.to_lowercase(),
        });
    }

    // /r/<sub>/comments/<id>[/<slug>[/<comment_id>]] or /comments/<id>
    let comments_idx = segments.iter().position(|s| s.eq_ignore_ascii_case("comments"))?;
    let submission_id = segments.get(comments_idx + 1).filter(|id| is_base36(id))?.to_lowercase();

    if let Some(comment_id) = segments.get(comments_idx + 3).filter(|id| is_base36(id)) {
        return Some(RedditTarget::Comment { id: comment_id.to_lowercase(), submission_id });
    }

    Some(RedditTarget::Submission { id: submission_id })
}

fn is_base36(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}
