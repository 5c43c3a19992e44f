//! GitLab merge-request adapter.
//!
//! Field mapping: `object_attributes.iid` -> request_number,
//! `project.name` -> repo_name, `object_attributes.last_commit.id` ->
//! last_commit_id. API calls go through `api/v4` with a `Private-Token`
//! header against the instance base URL.

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CanonicalChange, CanonicalEvent, CommitInfo, Platform};

use super::{
    count_diff_lines, fetch_with_retry, first_line, get_json, has_allowed_extension, http_client,
    number_at, text_at, PlatformAdapter, FETCH_RETRY_DELAY,
};

/// Merge-request actions that are worth reasoning about.
pub const ALLOWED_ACTIONS: &[&str] = &["open", "update"];

/// The raw action string of a GitLab webhook payload.
pub fn action_of(payload: &Value) -> String {
    text_at(payload, "/object_attributes/action")
}

/// Whether the merge request is a draft / work in progress.
pub fn is_draft(payload: &Value) -> bool {
    let truthy = |ptr: &str| {
        payload
            .pointer(ptr)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };
    truthy("/object_attributes/draft") || truthy("/object_attributes/work_in_progress")
}

pub struct GitlabAdapter {
    event: CanonicalEvent,
    /// Target project id, required for the `api/v4/projects/{id}` routes.
    project_id: Option<i64>,
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl GitlabAdapter {
    /// Parse a GitLab `merge_request` webhook payload. Missing fields map
    /// to empty defaults; the orchestrator aborts on an empty commit id.
    pub fn from_webhook(payload: &Value, token: String, base_url: String) -> Self {
        let repo_name = text_at(payload, "/project/name");
        let repo_full_name = {
            let full = text_at(payload, "/project/path_with_namespace");
            if full.is_empty() { repo_name.clone() } else { full }
        };

        let event = CanonicalEvent {
            platform: Platform::Gitlab,
            repo_name,
            repo_full_name,
            request_number: number_at(payload, "/object_attributes/iid"),
            request_url: text_at(payload, "/object_attributes/url"),
            request_title: text_at(payload, "/object_attributes/title"),
            source_branch: text_at(payload, "/object_attributes/source_branch"),
            target_branch: text_at(payload, "/object_attributes/target_branch"),
            last_commit_id: text_at(payload, "/object_attributes/last_commit/id"),
            author: text_at(payload, "/user/username"),
            action: action_of(payload),
            is_draft: is_draft(payload),
        };

        let project_id = number_at(payload, "/object_attributes/target_project_id")
            .or_else(|| number_at(payload, "/project/id"));

        Self {
            event,
            project_id,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: http_client(),
        }
    }

    fn request_url(&self, resource: &str) -> Option<String> {
        let project_id = self.project_id?;
        let iid = self.event.request_number?;
        Some(format!(
            "{}/api/v4/projects/{project_id}/merge_requests/{iid}/{resource}",
            self.base_url
        ))
    }

    async fn get(&self, url: &str) -> Result<Value, super::FetchError> {
        get_json(&self.http, url, &[("Private-Token", self.token.as_str())]).await
    }
}

#[async_trait]
impl PlatformAdapter for GitlabAdapter {
    fn event(&self) -> &CanonicalEvent {
        &self.event
    }

    async fn fetch_changes(&self) -> Vec<Value> {
        let Some(url) = self.request_url("changes?access_raw_diffs=true") else {
            return Vec::new();
        };
        fetch_with_retry("gitlab changes", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            Ok(body
                .pointer("/changes")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default())
        })
        .await
    }

    async fn fetch_commits(&self) -> Vec<CommitInfo> {
        let Some(url) = self.request_url("commits") else {
            return Vec::new();
        };
        fetch_with_retry("gitlab commits", FETCH_RETRY_DELAY, || async {
            let body = self.get(&url).await?;
            let commits = body.as_array().cloned().unwrap_or_default();
            Ok(commits
                .iter()
                .map(|c| {
                    let message = text_at(c, "/message");
                    let title = {
                        let t = text_at(c, "/title");
                        if t.is_empty() { first_line(&message) } else { t }
                    };
                    CommitInfo {
                        id: text_at(c, "/id"),
                        title,
                        message,
                    }
                })
                .collect())
        })
        .await
    }

    /// GitLab's changes API carries no addition/deletion counts, so they
    /// are derived from the unified diff text.
    fn filter_changes(&self, raw: &[Value], extensions: &[String]) -> Vec<CanonicalChange> {
        raw.iter()
            .filter(|item| {
                !item
                    .pointer("/deleted_file")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
            })
            .filter_map(|item| {
                let new_path = text_at(item, "/new_path");
                if !has_allowed_extension(&new_path, extensions) {
                    return None;
                }
                let diff = text_at(item, "/diff");
                let (additions, deletions) = count_diff_lines(&diff);
                Some(CanonicalChange {
                    new_path,
                    diff,
                    additions,
                    deletions,
                })
            })
            .collect()
    }
}
