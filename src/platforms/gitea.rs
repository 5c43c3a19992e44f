//! Gitea pull-request adapter.
//!
//! Field mapping tolerates the payload drift between Gitea versions:
//! `pull_request.number | index | id` -> request_number,
//! `head.ref | head_branch` -> source_branch, `user.login | user.username`
//! -> author. API calls go through `api/v1` on the instance base URL.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CanonicalChange, CanonicalEvent, CommitInfo, Platform};

use super::{
    count_diff_lines, fetch_with_retry, first_line, get_json, has_allowed_extension, http_client,
    number_at, text_at, PlatformAdapter, FETCH_RETRY_DELAY,
};

/// Pull-request actions that are worth reasoning about. Gitea's action
/// vocabulary drifted across releases, so both spellings are accepted.
pub const ALLOWED_ACTIONS: &[&str] = &["opened", "open", "reopened", "synchronize", "synchronized"];

/// The raw action string of a Gitea webhook payload.
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

pub struct GiteaAdapter {
    event: CanonicalEvent,
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl GiteaAdapter {
    /// Parse a Gitea `pull_request` webhook payload.
    pub fn from_webhook(payload: &Value, token: String, base_url: String) -> Self {
        let repo_name = text_at(payload, "/repository/name");
        let repo_full_name = {
            let full = text_at(payload, "/repository/full_name");
            if full.is_empty() { repo_name.clone() } else { full }
        };

        let request_number = number_at(payload, "/pull_request/number")
            .or_else(|| number_at(payload, "/pull_request/index"))
            .or_else(|| number_at(payload, "/pull_request/id"));

        let source_branch = {
            let head_ref = text_at(payload, "/pull_request/head/ref");
            if head_ref.is_empty() {
                text_at(payload, "/pull_request/head_branch")
            } else {
                head_ref
            }
        };
        let target_branch = {
            let base_ref = text_at(payload, "/pull_request/base/ref");
            if base_ref.is_empty() {
                text_at(payload, "/pull_request/base_branch")
            } else {
                base_ref
            }
        };
        let request_url = {
            let html = text_at(payload, "/pull_request/html_url");
            if html.is_empty() {
                text_at(payload, "/pull_request/url")
            } else {
                html
            }
        };
        let author = {
            let login = text_at(payload, "/pull_request/user/login");
            if login.is_empty() {
                text_at(payload, "/pull_request/user/username")
            } else {
                login
            }
        };

        let event = CanonicalEvent {
            platform: Platform::Gitea,
            repo_name,
            repo_full_name,
            request_number,
            request_url,
            request_title: text_at(payload, "/pull_request/title"),
            source_branch,
            target_branch,
            last_commit_id: text_at(payload, "/pull_request/head/sha"),
            author,
            action: action_of(payload),
            is_draft: is_draft(payload),
        };

        Self {
            event,
            base_url: base_url.trim_end_matches('/').to_string(),
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
            "{}/api/v1/repos/{}/pulls/{number}/{resource}",
            self.base_url, self.event.repo_full_name
        ))
    }

    async fn get(&self, url: &str) -> Result<Value, super::FetchError> {
        let auth = format!("token {}", self.token);
        get_json(
            &self.http,
            url,
            &[
                ("Authorization", auth.as_str()),
                ("Accept", "application/json"),
            ],
        )
        .await
    }
}

#[async_trait]
impl PlatformAdapter for GiteaAdapter {
    fn event(&self) -> &CanonicalEvent {
        &self.event
    }

    async fn fetch_changes(&self) -> Vec<Value> {
        let Some(url) = self.request_url("files") else {
            return Vec::new();
        };
        fetch_with_retry("gitea files", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            Ok(body.as_array().cloned().unwrap_or_default())
        })
        .await
    }

    async fn fetch_commits(&self) -> Vec<CommitInfo> {
        let Some(url) = self.request_url("commits") else {
            return Vec::new();
        };
        fetch_with_retry("gitea commits", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            let commits = body.as_array().cloned().unwrap_or_default();
            Ok(commits
                .iter()
                .map(|c| {
                    let message = {
                        let m = text_at(c, "/commit/message");
                        if m.is_empty() { text_at(c, "/message") } else { m }
                    };
                    let id = {
                        let sha = text_at(c, "/sha");
                        if sha.is_empty() { text_at(c, "/id") } else { sha }
                    };
                    CommitInfo {
                        id,
                        title: first_line(&message),
                        message,
                    }
                })
                .collect())
        })
        .await
    }

    /// Counts come from the API when present; older instances omit them
    /// and the counts are derived from the patch text instead.
    fn filter_changes(&self, raw: &[Value], extensions: &[String]) -> Vec<CanonicalChange> {
        raw.iter()
            .filter(|item| {
                let status = text_at(item, "/status").to_lowercase();
                status != "removed" && status != "deleted"
            })
            .filter_map(|item| {
                let new_path = {
                    let name = text_at(item, "/filename");
                    if name.is_empty() { text_at(item, "/path") } else { name }
                };
                if !has_allowed_extension(&new_path, extensions) {
                    return None;
                }
                let diff = {
                    let patch = text_at(item, "/patch");
                    if patch.is_empty() { text_at(item, "/diff") } else { patch }
                };
                let (derived_add, derived_del) = count_diff_lines(&diff);
                Some(CanonicalChange {
                    new_path,
                    additions: number_at(item, "/additions").unwrap_or(derived_add as i64).max(0)
                        as u32,
                    deletions: number_at(item, "/deletions").unwrap_or(derived_del as i64).max(0)
                        as u32,
                    diff,
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
                "number": 5,
                "html_url": "https://gitea.example.com/acme/billing/pulls/5",
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
        let adapter = GiteaAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://gitea.example.com/".into(),
        );
        let event = adapter.event();
        assert_eq!(event.platform, Platform::Gitea);
        assert_eq!(event.request_number, Some(5));
        assert_eq!(event.source_branch, "feature/retry");
        assert_eq!(event.last_commit_id, "abc123");
        assert_eq!(event.author, "jsmith");
    }

    #[test]
    fn tolerates_alternate_payload_keys() {
        let payload = json!({
            "action": "synchronized",
            "repository": {"name": "billing", "full_name": "acme/billing"},
            "pull_request": {
                "index": "8",
                "url": "https://gitea.example.com/acme/billing/pulls/8",
                "title": "Refactor",
                "head_branch": "refactor",
                "base_branch": "main",
                "head": {"sha": "def456"},
                "user": {"username": "mlee"}
            }
        });
        let adapter =
            GiteaAdapter::from_webhook(&payload, "tok".into(), "https://gitea.example.com".into());
        let event = adapter.event();
        assert_eq!(event.request_number, Some(8));
        assert_eq!(event.source_branch, "refactor");
        assert_eq!(event.target_branch, "main");
        assert_eq!(event.author, "mlee");
        assert_eq!(event.request_url, "https://gitea.example.com/acme/billing/pulls/8");
    }

    #[test]
    fn files_url_uses_api_v1() {
        let adapter = GiteaAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://gitea.example.com".into(),
        );
        assert_eq!(
            adapter.request_url("files").unwrap(),
            "https://gitea.example.com/api/v1/repos/acme/billing/pulls/5/files"
        );
    }

    #[test]
    fn filter_derives_counts_when_api_omits_them() {
        let adapter = GiteaAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://gitea.example.com".into(),
        );
        let raw = vec![json!({
            "filename": "app.py",
            "patch": "@@ -1,1 +1,3 @@\n context\n+one\n+two\n"
        })];
        let exts = vec![".py".to_string()];

        let changes = adapter.filter_changes(&raw, &exts);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].additions, 2);
        assert_eq!(changes[0].deletions, 0);
    }

    #[test]
    fn filter_drops_deleted_status_variants() {
        let adapter = GiteaAdapter::from_webhook(
            &sample_payload(),
            "tok".into(),
            "https://gitea.example.com".into(),
        );
        let raw = vec![
            json!({"filename": "a.py", "status": "removed", "patch": "-x\n"}),
            json!({"filename": "b.py", "status": "Deleted", "patch": "-y\n"}),
            json!({"filename": "c.py", "status": "changed", "patch": "+z\n", "additions": 1, "deletions": 0}),
        ];
        let exts = vec![".py".to_string()];

        let changes = adapter.filter_changes(&raw, &exts);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].new_path, "c.py");
    }
}
