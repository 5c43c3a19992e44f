//! Per-event pipeline: dedup check, retrieval, reasoning, persistence.
//!
//! Runs after the HTTP boundary has already acknowledged the delivery, so
//! nothing here can fail the webhook response. Every abort path is a
//! logged no-op.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{CanonicalChange, CommitInfo, DedupKey, ReasoningRecord};
use crate::platforms::PlatformAdapter;
use crate::reasoning::ReasoningService;
use crate::storage::{InsertOutcome, Store};

/// Orchestrates one reasoning run per accepted webhook event.
pub struct Pipeline {
    store: Arc<Store>,
    reasoner: Arc<ReasoningService>,
    settings: Arc<Settings>,
}

impl Pipeline {
    pub fn new(store: Arc<Store>, reasoner: Arc<ReasoningService>, settings: Arc<Settings>) -> Self {
        Self {
            store,
            reasoner,
            settings,
        }
    }

    /// Process one event end to end. Infallible by contract: all failure
    /// modes either degrade (reasoning, fetches) or abort with a log line.
    pub async fn run(&self, adapter: &dyn PlatformAdapter) {
        let event = adapter.event();
        if event.last_commit_id.is_empty() {
            warn!(
                platform = %event.platform,
                repo = %event.repo_name,
                "event carries no head commit id, skipping"
            );
            return;
        }

        let key = DedupKey::of(event);
        // An existence-check failure is not a reason to drop the event;
        // the insert constraint still guarantees at-most-once.
        match self.store.exists(&key) {
            Ok(true) => {
                info!(%key, "already processed, skipping");
                return;
            }
            Ok(false) => {}
            Err(err) => warn!(%key, %err, "dedup lookup failed, proceeding"),
        }

        let raw = adapter.fetch_changes().await;
        let changes = adapter.filter_changes(&raw, &self.settings.extensions);
        if changes.is_empty() {
            info!(%key, "no relevant file changes, skipping");
            return;
        }

        let commits = adapter.fetch_commits().await;
        let commit_messages = join_commit_titles(&commits);

        let diffs_text = render_diffs(&changes);
        let result = self.reasoner.reason(&diffs_text, &commit_messages).await;

        let record = ReasoningRecord::assemble(
            event,
            commit_messages,
            result,
            chrono::Utc::now().timestamp(),
        );
        match self.store.insert(&record) {
            Ok(InsertOutcome::Inserted) => {
                info!(%key, files = changes.len(), "reasoning record stored")
            }
            Ok(InsertOutcome::Duplicate) => {
                info!(%key, "lost insert race to a concurrent delivery")
            }
            Err(err) => warn!(%key, %err, "failed to store reasoning record"),
        }
    }
}

/// Commit titles joined with `"; "`, in delivery order.
fn join_commit_titles(commits: &[CommitInfo]) -> String {
    commits
        .iter()
        .map(|c| c.title.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One labelled block per file, with its counts and raw diff.
fn render_diffs(changes: &[CanonicalChange]) -> String {
    let mut out = String::new();
    for change in changes {
        out.push_str(&format!(
            "### {} (+{} -{})\n{}\n\n",
            change.new_path, change.additions, change.deletions, change.diff
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn commit_titles_join_with_semicolons() {
        let commits = vec![
            CommitInfo {
                id: "a".into(),
                title: "Add retry".into(),
                message: "Add retry\n\nbody".into(),
            },
            CommitInfo {
                id: "b".into(),
                title: String::new(),
                message: String::new(),
            },
            CommitInfo {
                id: "c".into(),
                title: "Bump deps".into(),
                message: "Bump deps".into(),
            },
        ];
        assert_eq!(join_commit_titles(&commits), "Add retry; Bump deps");
        assert_eq!(join_commit_titles(&[]), "");
    }

    #[test]
    fn rendered_diffs_label_each_file() {
        let changes = vec![
            CanonicalChange {
                new_path: "src/Foo.java".into(),
                diff: "+a\n-b".into(),
                additions: 1,
                deletions: 1,
            },
            CanonicalChange {
                new_path: "app.py".into(),
                diff: "+x".into(),
                additions: 1,
                deletions: 0,
            },
        ];
        let text = render_diffs(&changes);
        assert!(text.contains("### src/Foo.java (+1 -1)"));
        assert!(text.contains("### app.py (+1 -0)"));
        assert!(text.contains("+a\n-b"));
    }
}
