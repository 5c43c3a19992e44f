//! GitHub pull-request adapter.
//!
//! Field mapping: `pull_request.number` -> request_number,
//! `repository.name` -> repo_name, `pull_request.head.sha` ->
//! last_commit_id. API calls go to `api.github.com` (derived from the
//! base URL) with a `token` Authorization header.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::models::{CanonicalChange, CanonicalEvent, CommitInfo, Platform};

use super::{
    fetch_with_retry, first_line, get_json, has_allowed_extension, http_client, number_at,
    text_at, PlatformAdapter, FETCH_RETRY_DELAY,
};

/// Pull-request actions that are worth reasoning about.
pub const ALLOWED_ACTIONS: &[&str] = &["opened", "synchronize"];

/// The raw action string of a GitHub webhook payload.
pub fn action_of(payload: &Value) -> String {
    text_at(payload, "/action")
}

/// Whether the pull request is a draft.
pub fn is_draft(payload: &Value) -> bool {
    payload
        .pointer("/pull_request/draft")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Leading hunk header of a pure-rename patch: no lines in the new file.
static EMPTY_ADD_HUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -\d+,\d+ \+0,0 @@").unwrap());

/// GitHub returns an all-removal patch for a file whose content moved
/// unchanged (pure rename). Such entries carry no reviewable change.
fn is_pure_rename_patch(patch: &str) -> bool {
    if !EMPTY_ADD_HUNK_RE.is_match(patch) {
        return false;
    }
    patch
        .lines()
        .skip(1)
        .all(|line| line.is_empty() || line.starts_with('-'))
}

pub struct GithubAdapter {
    event: CanonicalEvent,
    api_root: String,
    token: String,
    http: reqwest::Client,
}

impl GithubAdapter {
    /// Parse a GitHub `pull_request` webhook payload.
    pub fn from_webhook(payload: &Value, token: String, base_url: String) -> Self {
        let repo_name = text_at(payload, "/repository/name");
        let repo_full_name = {
            let full = text_at(payload, "/repository/full_name");
            if full.is_empty() { repo_name.clone() } else { full }
        };

        let event = CanonicalEvent {
            platform: Platform::Github,
            repo_name,
            repo_full_name,
            request_number: number_at(payload, "/pull_request/number"),
            request_url: text_at(payload, "/pull_request/html_url"),
            request_title: text_at(payload, "/pull_request/title"),
            source_branch: text_at(payload, "/pull_request/head/ref"),
            target_branch: text_at(payload, "/pull_request/base/ref"),
            last_commit_id: text_at(payload, "/pull_request/head/sha"),
            author: text_at(payload, "/pull_request/user/login"),
            action: action_of(payload),
            is_draft: is_draft(payload),
        };

        Self {
            event,
            api_root: api_root(&base_url),
            token,
            http: http_client(),
        }
    }

    fn request_url(&self, resource: &str) -> Option<String> {
        if self.event.repo_full_name.is_empty() {
            return None;
        }
        let number = self.event.request_number?;
        Some(format!(
            "{}/repos/{}/pulls/{number}/{resource}",
            self.api_root, self.event.repo_full_name
        ))
    }

    async fn get(&self, url: &str) -> Result<Value, super::FetchError> {
        let auth = format!("token {}", self.token);
        get_json(
            &self.http,
            url,
            &[
                ("Authorization", auth.as_str()),
                ("Accept", "application/vnd.github.v3+json"),
            ],
        )
        .await
    }
}

/// Derive the REST root from a base URL: `github.com` maps to
/// `api.github.com`; anything without an api host falls back to the
/// public API.
fn api_root(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.contains("github.com") {
        base.replace("github.com", "api.github.com")
    } else {
        "https://api.github.com".to_string()
    }
}

#[async_trait]
impl PlatformAdapter for GithubAdapter {
    fn event(&self) -> &CanonicalEvent {
        &self.event
    }

    async fn fetch_changes(&self) -> Vec<Value> {
        let Some(url) = self.request_url("files") else {
            return Vec::new();
        };
        fetch_with_retry("github files", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            Ok(body.as_array().cloned().unwrap_or_default())
        })
        .await
    }

    async fn fetch_commits(&self) -> Vec<CommitInfo> {
        let Some(url) = self.request_url("commits") else {
            return Vec::new();
        };
        fetch_with_retry("github commits", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            let commits = body.as_array().cloned().unwrap_or_default();
            Ok(commits
                .iter()
                .map(|c| {
                    let message = text_at(c, "/commit/message");
                    CommitInfo {
                        id: text_at(c, "/sha"),
                        title: first_line(&message),
                        message,
                    }
                })
                .collect())
        })
        .await
    }

    /// The files API supplies addition/deletion counts directly; pure
    /// renames are excluded by their empty-add hunk shape.
    fn filter_changes(&self, raw: &[Value], extensions: &[String]) -> Vec<CanonicalChange> {
        raw.iter()
            .filter(|item| text_at(item, "/status") != "removed")
            .filter_map(|item| {
                let new_path = text_at(item, "/filename");
                if !has_allowed_extension(&new_path, extensions) {
                    return None;
                }
                let diff = text_at(item, "/patch");
                if !diff.is_empty() && is_pure_rename_patch(&diff) {
                    return None;
                }
                Some(CanonicalChange {
                    new_path,
                    diff,
                    additions: number_at(item, "/additions").unwrap_or(0).max(0) as u32,
                    deletions: number_at(item, "/deletions").unwrap_or(0).max(0) as u32,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "action": "opened",
            "repository": {"name": "billing", "full_name": "acme/billing"},
            "pull_request": {
                "number": 7,
                "html_url": "https://github.com/acme/billing/pull/7",
                "title": "Add invoice retry",
                "draft": false,
                "head": {"ref": "feature/retry", "sha": "abc123"},
                "base": {"ref": "main"},
                "user": {"login": "jsmith"}
            }
        })
    }

    #[test]
    fn parses_canonical_event() {
        let adapter = GithubAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://github.com".into(),
        );
        let event = adapter.event();
        assert_eq!(event.platform, Platform::Github);
        assert_eq!(event.repo_full_name, "acme/billing");
        assert_eq!(event.request_number, Some(7));
        assert_eq!(event.last_commit_id, "abc123");
        assert_eq!(event.author, "jsmith");
        assert_eq!(event.action, "opened");
    }

    #[test]
    fn api_root_rewrites_public_host() {
        assert_eq!(api_root("https://github.com"), "https://api.github.com");
        assert_eq!(api_root("https://github.com/"), "https://api.github.com");
        assert_eq!(api_root("https://example.org"), "https://api.github.com");
    }

    #[test]
    fn files_url_uses_full_name_and_number() {
        let adapter = GithubAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://github.com".into(),
        );
        assert_eq!(
            adapter.request_url("files").unwrap(),
            "https://api.github.com/repos/acme/billing/pulls/7/files"
        );
    }

    #[test]
    fn filter_uses_api_counts_and_drops_removed() {
        let adapter = GithubAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://github.com".into(),
        );
        let raw = vec![
            json!({
                "filename": "src/Foo.java",
                "patch": "@@ -1,2 +1,5 @@\n context\n+a\n+b\n+c\n-d\n",
                "status": "modified",
                "additions": 3,
                "deletions": 1
            }),
            json!({"filename": "src/Gone.java", "status": "removed", "additions": 0, "deletions": 10}),
        ];
        let exts = vec![".java".to_string()];

        let changes = adapter.filter_changes(&raw, &exts);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].additions, 3);
        assert_eq!(changes[0].deletions, 1);
    }

    #[test]
    fn filter_excludes_pure_rename_patches() {
        let adapter = GithubAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://github.com".into(),
        );
        let raw = vec![json!({
            "filename": "src/Moved.java",
            "patch": "@@ -1,3 +0,0 @@\n-one\n-two\n-three",
            "status": "renamed",
            "additions": 0,
            "deletions": 3
        })];
        let exts = vec![".java".to_string()];

        assert!(adapter.filter_changes(&raw, &exts).is_empty());
    }

    #[test]
    fn rename_pattern_requires_only_removal_lines() {
        assert!(is_pure_rename_patch("@@ -1,2 +0,0 @@\n-a\n-b"));
        assert!(!is_pure_rename_patch("@@ -1,2 +0,0 @@\n-a\n+b"));
        assert!(!is_pure_rename_patch("@@ -1,2 +1,2 @@\n-a\n+b"));
    }

    #[test]
    fn missing_patch_keeps_entry_with_empty_diff() {
        let adapter = GithubAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://github.com".into(),
        );
        // Binary files come back without a patch field.
        let raw = vec![json!({"filename": "src/Bin.java", "status": "modified", "additions": 0, "deletions": 0})];
        let exts = vec![".java".to_string()];

        let changes = adapter.filter_changes(&raw, &exts);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].diff.is_empty());
    }
}
