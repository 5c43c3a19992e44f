//! Platform adapters: webhook parsing and REST retrieval per platform.
//!
//! Each platform module maps its webhook payload into a [`CanonicalEvent`]
//! and exposes change/commit retrieval against that platform's REST API.
//! The orchestrator depends only on the [`PlatformAdapter`] trait.

pub mod gitea;
pub mod github;
pub mod gitlab;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{CanonicalChange, CanonicalEvent, CommitInfo, Platform};

/// Number of attempts for each upstream REST fetch.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Fixed delay between fetch attempts. Deliberately not exponential and
/// without jitter; the upstream contract is a short eventual-consistency
/// lag, not rate limiting.
pub const FETCH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Errors from a single upstream REST attempt. Never escapes an adapter:
/// after the retry budget is spent the fetch degrades to an empty list.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

/// One adapter per platform: canonical event access, raw change/commit
/// retrieval, and the platform-specific change filter.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The canonical event parsed from the webhook payload.
    fn event(&self) -> &CanonicalEvent;

    /// Fetch the raw change list from the platform REST API. Retries
    /// transient failures and empty results; degrades to an empty list.
    async fn fetch_changes(&self) -> Vec<Value>;

    /// Fetch the commits attached to the request. Same retry contract
    /// as [`fetch_changes`](Self::fetch_changes).
    async fn fetch_commits(&self) -> Vec<CommitInfo>;

    /// Normalize a raw change list: drop deleted files, keep only
    /// allow-listed extensions, resolve addition/deletion counts.
    fn filter_changes(&self, raw: &[Value], extensions: &[String]) -> Vec<CanonicalChange>;
}

/// Construct the adapter for a platform from its webhook payload.
pub fn build_adapter(
    platform: Platform,
    payload: &Value,
    token: String,
    base_url: String,
) -> Box<dyn PlatformAdapter> {
    match platform {
        Platform::Gitlab => Box::new(gitlab::GitlabAdapter::from_webhook(payload, token, base_url)),
        Platform::Github => Box::new(github::GithubAdapter::from_webhook(payload, token, base_url)),
        Platform::Gitea => Box::new(gitea::GiteaAdapter::from_webhook(payload, token, base_url)),
    }
}

/// Run a fetch up to [`FETCH_ATTEMPTS`] times with a fixed inter-attempt
/// delay. An HTTP-success-but-empty result is retried too — it covers
/// eventual-consistency lag on the upstream side. Exhaustion yields an
/// empty list, never an error.
pub(crate) async fn fetch_with_retry<T, F, Fut>(what: &str, delay: Duration, mut fetch: F) -> Vec<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<T>, FetchError>>,
{
    for attempt in 1..=FETCH_ATTEMPTS {
        match fetch().await {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => debug!(what, attempt, "fetch returned no items"),
            Err(err) => warn!(what, attempt, %err, "fetch attempt failed"),
        }
        if attempt < FETCH_ATTEMPTS {
            tokio::time::sleep(delay).await;
        }
    }
    Vec::new()
}

/// Shared HTTP client for an adapter. GitHub rejects requests without a
/// User-Agent, so one is always set.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(crate::constants::APP_NAME)
        .build()
        .unwrap_or_default()
}

/// GET a JSON document with the given headers.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<Value, FetchError> {
    let mut request = http.get(url);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    Ok(response.json().await?)
}

/// String at a JSON pointer, empty when absent or not a string.
pub(crate) fn text_at(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Tolerant numeric extraction: accepts a JSON number or a numeric string.
pub(crate) fn number_at(value: &Value, pointer: &str) -> Option<i64> {
    match value.pointer(pointer) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First line of a commit message.
pub(crate) fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}

/// Whether a path ends with one of the allow-listed extensions.
pub(crate) fn has_allowed_extension(path: &str, extensions: &[String]) -> bool {
    !path.is_empty() && extensions.iter().any(|ext| path.ends_with(ext.as_str()))
}

/// Count added/removed lines in a unified diff, excluding the `+++`/`---`
/// file-header lines. Used where the upstream API supplies no counts.
pub(crate) fn count_diff_lines(diff: &str) -> (u32, u32) {
    let mut additions = 0;
    let mut deletions = 0;
    for line in diff.lines() {
        if line.starts_with('+') && !line.starts_with("+++") {
            additions += 1;
        } else if line.starts_with('-') && !line.starts_with("---") {
            deletions += 1;
        }
    }
    (additions, deletions)
}
