//! HTTP boundary tests: delivery acknowledgement and rejection.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use whydiff::config::Settings;
use whydiff::dispatch::Gate;
use whydiff::env::Env;
use whydiff::orchestrator::Pipeline;
use whydiff::providers::{Message, ProviderError, ReasoningProvider};
use whydiff::reasoning::{PromptTemplates, ReasoningService};
use whydiff::server::router;
use whydiff::storage::Store;

struct SilentProvider;

#[async_trait::async_trait]
impl ReasoningProvider for SilentProvider {
    async fn completions(&self, _messages: &[Message]) -> Result<String, ProviderError> {
        Ok(r#"{"summary":"s","categories":[],"details":[]}"#.to_string())
    }
}

fn app(vars: &[(&str, &str)]) -> axum::Router {
    let settings = Arc::new(Settings::from_env(&Env::mock(vars.to_vec())));
    let store = Arc::new(Store::in_memory().unwrap());
    let reasoner = Arc::new(ReasoningService::new(
        Arc::new(SilentProvider) as Arc<dyn ReasoningProvider>,
        PromptTemplates::default(),
        settings.max_input_tokens,
    ));
    let pipeline = Arc::new(Pipeline::new(store, reasoner, Arc::clone(&settings)));
    router(Arc::new(Gate::new(settings, pipeline)))
}

async fn body_json(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(body: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/reasoning/webhook")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn liveness_endpoint_answers() {
    let response = app(&[])
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let response = app(&[]).oneshot(post("not json", &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["reason"], "invalid_payload");
}

#[tokio::test]
async fn unrecognised_event_is_rejected() {
    let response = app(&[])
        .oneshot(post(r#"{"object_kind":"push"}"#, &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["reason"], "unsupported_event");
}

#[tokio::test]
async fn draft_pull_request_is_rejected() {
    let payload = json!({
        "action": "opened",
        "repository": {"name": "billing", "full_name": "acme/billing"},
        "pull_request": {
            "number": 7,
            "draft": true,
            "head": {"ref": "f", "sha": "abc"},
            "base": {"ref": "main"}
        }
    });
    let response = app(&[("GITHUB_ACCESS_TOKEN", "ghp")])
        .oneshot(post(&payload.to_string(), &[("x-github-event", "pull_request")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["reason"], "draft");
}

#[tokio::test]
async fn accepted_delivery_is_acknowledged_immediately() {
    let payload = json!({
        "object_kind": "merge_request",
        "project": {"id": 1, "name": "billing", "web_url": "https://git.example.com/acme/billing"},
        "repository": {"name": "billing", "homepage": "https://git.example.com/acme/billing"},
        "object_attributes": {
            "iid": 42,
            "action": "open",
            "title": "Add retry",
            "source_branch": "feature",
            "target_branch": "main",
            "last_commit": {"id": "abc123"}
        },
        "user": {"username": "jsmith"}
    });
    let response = app(&[("GITLAB_ACCESS_TOKEN", "glpat")])
        .oneshot(post(&payload.to_string(), &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["platform"], "gitlab");
}

#[tokio::test]
async fn missing_token_is_reported() {
    let payload = json!({
        "object_kind": "merge_request",
        "repository": {"name": "billing", "homepage": "https://git.example.com/acme/billing"},
        "object_attributes": {"iid": 1, "action": "open", "source_branch": "f", "target_branch": "m"}
    });
    let response = app(&[]).oneshot(post(&payload.to_string(), &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["reason"], "missing_token");
}
