//! Shared types used across all modules.
//!
//! Canonical, platform-independent representations of review-request
//! events, file changes, and reasoning results. Other modules import
//! from here rather than reaching into each other's internals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source-control platform a webhook originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Gitlab,
    Github,
    Gitea,
}

impl Platform {
    /// Stable lowercase identifier, used as the stored `platform` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Gitlab => "gitlab",
            Platform::Github => "github",
            Platform::Gitea => "gitea",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gitlab" => Ok(Platform::Gitlab),
            "github" => Ok(Platform::Github),
            "gitea" => Ok(Platform::Gitea),
            other => Err(format!(
                "unsupported platform: '{other}'. Supported: gitlab, github, gitea"
            )),
        }
    }
}

/// Platform-agnostic view of a merge/pull request, built once per webhook
/// delivery and immutable afterwards.
///
/// `last_commit_id` may be empty here — the orchestrator aborts on it
/// before any network call, so every event that proceeds past the gate
/// into a pipeline run carries a non-empty commit id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub platform: Platform,
    pub repo_name: String,
    pub repo_full_name: String,
    /// Request identifier; platforms disagree on the payload key and
    /// occasionally deliver it as a numeric string.
    pub request_number: Option<i64>,
    pub request_url: String,
    pub request_title: String,
    pub source_branch: String,
    pub target_branch: String,
    pub last_commit_id: String,
    pub author: String,
    /// Raw platform action string ("open", "synchronize", ...).
    pub action: String,
    pub is_draft: bool,
}

/// One file-level change, normalized from a platform change list.
///
/// Deleted files are filtered out upstream and `new_path` always carries
/// an allow-listed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalChange {
    pub new_path: String,
    /// Raw unified-diff text. May be empty for binary or renamed files.
    pub diff: String,
    pub additions: u32,
    pub deletions: u32,
}

/// A single commit attached to a review request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    /// First line of the commit message.
    pub title: String,
    pub message: String,
}

/// Output of the business-reasoning call.
///
/// Always fully populated: on failure the fields carry degraded content
/// (a diagnostic summary, `"other"` categories, an empty details array),
/// never absent values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningResult {
    /// Business summary; falls back to a diagnostic message.
    pub summary: String,
    /// Comma-joined category tags.
    pub categories: String,
    /// JSON-encoded array of `{area, change}` objects.
    pub details: String,
    /// The unparsed or partially-parsed model response.
    pub raw: String,
}

impl ReasoningResult {
    /// Degraded result used whenever the reasoning call fails or its
    /// output cannot be interpreted.
    pub fn fallback(summary: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            categories: "other".to_string(),
            details: "[]".to_string(),
            raw: raw.into(),
        }
    }
}

/// The durable unit of work: one reasoning run over one review-request
/// state. Created exactly once per successful pipeline run, never updated
/// or deleted by this service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningRecord {
    pub platform: Platform,
    pub repo_name: String,
    pub request_number: Option<i64>,
    pub request_url: String,
    pub request_title: String,
    pub source_branch: String,
    pub target_branch: String,
    pub last_commit_id: String,
    pub author: String,
    /// Commit titles joined with `"; "`.
    pub commit_messages: String,
    /// Unix timestamp, assigned at insert time.
    pub created_at: i64,
    pub business_summary: String,
    pub reasoning_categories: String,
    pub reasoning_details: String,
    pub raw_reasoning_json: String,
}

impl ReasoningRecord {
    /// Assemble a record from a canonical event and a reasoning result.
    pub fn assemble(
        event: &CanonicalEvent,
        commit_messages: String,
        result: ReasoningResult,
        created_at: i64,
    ) -> Self {
        Self {
            platform: event.platform,
            repo_name: event.repo_name.clone(),
            request_number: event.request_number,
            request_url: event.request_url.clone(),
            request_title: event.request_title.clone(),
            source_branch: event.source_branch.clone(),
            target_branch: event.target_branch.clone(),
            last_commit_id: event.last_commit_id.clone(),
            author: event.author.clone(),
            commit_messages,
            created_at,
            business_summary: result.summary,
            reasoning_categories: result.categories,
            reasoning_details: result.details,
            raw_reasoning_json: result.raw,
        }
    }

    /// The dedup key of this record.
    pub fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            platform: self.platform,
            repo_name: &self.repo_name,
            source_branch: &self.source_branch,
            target_branch: &self.target_branch,
            last_commit_id: &self.last_commit_id,
        }
    }
}

/// Natural key identifying a review-request state that must be processed
/// at most once. Enforced by a composite uniqueness constraint in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKey<'a> {
    pub platform: Platform,
    pub repo_name: &'a str,
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub last_commit_id: &'a str,
}

impl<'a> DedupKey<'a> {
    /// The dedup key of a canonical event.
    pub fn of(event: &'a CanonicalEvent) -> Self {
        Self {
            platform: event.platform,
            repo_name: &event.repo_name,
            source_branch: &event.source_branch,
            target_branch: &event.target_branch,
            last_commit_id: &event.last_commit_id,
        }
    }
}

impl fmt::Display for DedupKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}->{} @{}",
            self.platform, self.repo_name, self.source_branch, self.target_branch, self.last_commit_id
        )
    }
}
