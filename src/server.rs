//! HTTP boundary: the webhook endpoint and a liveness probe.
//!
//! The webhook handler acknowledges or rejects a delivery synchronously;
//! accepted events are already running on a spawned pipeline task by the
//! time the response leaves.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tracing::info;

use crate::constants;
use crate::dispatch::Gate;

/// Build the service router.
pub fn router(gate: Arc<Gate>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/reasoning/webhook", post(webhook))
        .with_state(gate)
}

/// Bind and serve until the process is stopped.
pub async fn serve(gate: Arc<Gate>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening for webhook deliveries");
    axum::serve(listener, router(gate)).await?;
    Ok(())
}

async fn liveness() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": constants::APP_NAME}))
}

async fn webhook(
    State(gate): State<Arc<Gate>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let headers = lower_headers(&headers);
    match gate.handle(&body, &headers) {
        Ok((platform, _handle)) => (
            StatusCode::OK,
            Json(json!({"status": "accepted", "platform": platform.as_str()})),
        ),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "rejected",
                "reason": reason.code(),
                "message": reason.to_string(),
            })),
        ),
    }
}

/// Header names lowercased, non-UTF8 values dropped.
fn lower_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_names_are_lowercased() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Gitlab-Token", HeaderValue::from_static("glpat"));
        let lowered = lower_headers(&headers);
        assert_eq!(lowered.get("x-gitlab-token").map(String::as_str), Some("glpat"));
    }

    #[test]
    fn non_utf8_header_values_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-odd",
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );
        assert!(lower_headers(&headers).is_empty());
    }
}
