//! Webhook gate: platform detection, credential resolution, and the
//! accept/reject decision, followed by fire-and-forget dispatch.
//!
//! The gate is the synchronous part of delivery handling. Everything it
//! rejects gets a reason back to the sender; everything it accepts is
//! handed to the pipeline on a spawned task so the webhook response never
//! waits on upstream APIs or the LLM.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Settings;
use crate::models::Platform;
use crate::orchestrator::Pipeline;
use crate::platforms::{build_adapter, gitea, github, gitlab};

/// Why a delivery was rejected. The stable code goes into the HTTP
/// response body; the Display text into the human-readable message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("request body is not a JSON object")]
    InvalidPayload,

    #[error("not a recognised merge/pull request event")]
    UnsupportedEvent,

    #[error("no access token configured or supplied for this platform")]
    MissingToken,

    #[error("no base URL configured or derivable for this platform")]
    MissingBaseUrl,

    #[error("event action does not warrant processing")]
    ActionNotAllowed,

    #[error("draft requests are not processed")]
    Draft,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::InvalidPayload => "invalid_payload",
            RejectReason::UnsupportedEvent => "unsupported_event",
            RejectReason::MissingToken => "missing_token",
            RejectReason::MissingBaseUrl => "missing_base_url",
            RejectReason::ActionNotAllowed => "action_not_allowed",
            RejectReason::Draft => "draft",
        }
    }
}

/// Resolved inputs for building a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub platform: Platform,
    pub token: String,
    pub base_url: String,
}

/// Identify the platform from delivery headers and payload shape.
///
/// Gitea is checked before GitHub because Gitea sends an `X-GitHub-Event`
/// compatibility header alongside its own.
fn detect_platform(
    payload: &Value,
    headers: &HashMap<String, String>,
) -> Result<Platform, RejectReason> {
    if let Some(event) = headers.get("x-gitea-event") {
        return if event == "pull_request" {
            Ok(Platform::Gitea)
        } else {
            Err(RejectReason::UnsupportedEvent)
        };
    }
    if let Some(event) = headers.get("x-github-event") {
        return if event == "pull_request" {
            Ok(Platform::Github)
        } else {
            Err(RejectReason::UnsupportedEvent)
        };
    }
    if payload.get("object_kind").and_then(Value::as_str) == Some("merge_request") {
        return Ok(Platform::Gitlab);
    }
    Err(RejectReason::UnsupportedEvent)
}

fn token_header(platform: Platform) -> &'static str {
    match platform {
        Platform::Gitlab => "x-gitlab-token",
        Platform::Github => "x-github-token",
        Platform::Gitea => "x-gitea-token",
    }
}

/// Scheme and host of a URL, without the path.
fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}

/// Gate-level decision for one delivery: platform, credentials, and the
/// allow/draft checks. Pure; no I/O.
pub fn decide(
    settings: &Settings,
    payload: &Value,
    headers: &HashMap<String, String>,
) -> Result<Decision, RejectReason> {
    if !payload.is_object() {
        return Err(RejectReason::InvalidPayload);
    }
    let platform = detect_platform(payload, headers)?;

    let (is_draft, action, allowed): (bool, String, &[&str]) = match platform {
        Platform::Gitlab => (
            gitlab::is_draft(payload),
            gitlab::action_of(payload),
            gitlab::ALLOWED_ACTIONS,
        ),
        Platform::Github => (
            github::is_draft(payload),
            github::action_of(payload),
            github::ALLOWED_ACTIONS,
        ),
        Platform::Gitea => (
            gitea::is_draft(payload),
            gitea::action_of(payload),
            gitea::ALLOWED_ACTIONS,
        ),
    };
    if is_draft {
        return Err(RejectReason::Draft);
    }
    if !allowed.contains(&action.as_str()) {
        return Err(RejectReason::ActionNotAllowed);
    }

    let platform_settings = settings.platform(platform);
    let token = platform_settings
        .token
        .clone()
        .or_else(|| headers.get(token_header(platform)).cloned())
        .filter(|t| !t.is_empty())
        .ok_or(RejectReason::MissingToken)?;

    // GitLab has no hosted default; a self-hosted instance announces
    // itself through a header or the repository homepage.
    let base_url = platform_settings
        .base_url
        .clone()
        .or_else(|| headers.get("x-gitlab-instance").cloned().filter(|u| !u.is_empty()))
        .or_else(|| {
            payload
                .pointer("/repository/homepage")
                .or_else(|| payload.pointer("/project/web_url"))
                .and_then(Value::as_str)
                .and_then(origin_of)
        })
        .ok_or(RejectReason::MissingBaseUrl)?;

    Ok(Decision {
        platform,
        token,
        base_url,
    })
}

/// Accepts deliveries and dispatches pipeline runs.
pub struct Gate {
    settings: Arc<Settings>,
    pipeline: Arc<Pipeline>,
}

impl Gate {
    pub fn new(settings: Arc<Settings>, pipeline: Arc<Pipeline>) -> Self {
        Self { settings, pipeline }
    }

    /// Decide on one delivery and, when accepted, hand it to the pipeline
    /// on a spawned task. The returned handle is for tests; the server
    /// drops it, so a panicking run never affects delivery handling.
    pub fn handle(
        &self,
        body: &str,
        headers: &HashMap<String, String>,
    ) -> Result<(Platform, JoinHandle<()>), RejectReason> {
        let payload: Value =
            serde_json::from_str(body).map_err(|_| RejectReason::InvalidPayload)?;
        let decision = decide(&self.settings, &payload, headers)?;

        info!(
            platform = %decision.platform,
            repo = payload
                .pointer("/repository/name")
                .or_else(|| payload.pointer("/project/name"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or(""),
            "delivery accepted"
        );

        let adapter = build_adapter(decision.platform, &payload, decision.token, decision.base_url);
        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move {
            pipeline.run(adapter.as_ref()).await;
        });
        Ok((decision.platform, handle))
    }
}
