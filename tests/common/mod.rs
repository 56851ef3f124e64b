// tests/common/mod.rs
//
// Stub sources are real Axum servers on 127.0.0.1:0, so the full outbound
// path (reqwest pool, status handling, JSON decode) is exercised.
#![allow(dead_code)]

use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceExt as _;

use numbers_aggregator::{build_app, config::AppConfig};

pub const BODY_LIMIT: usize = 1024 * 1024;

pub const FIBO: [i64; 8] = [1, 1, 2, 3, 5, 8, 13, 21];
pub const FIBO_SORTED: [i64; 7] = [1, 2, 3, 5, 8, 13, 21];

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn_source(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub source");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Answers `{"numbers": [...]}` after `delay`.
pub fn numbers_source(numbers: &[i64], delay: Duration) -> Router {
    let numbers = numbers.to_vec();
    Router::new().route(
        "/",
        get(move || {
            let numbers = numbers.clone();
            async move {
                tokio::time::sleep(delay).await;
                Json(json!({ "numbers": numbers }))
            }
        }),
    )
}

/// Answers 503 after `delay`.
pub fn error_source(delay: Duration) -> Router {
    Router::new().route(
        "/",
        get(move || async move {
            tokio::time::sleep(delay).await;
            (StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
        }),
    )
}

/// Answers 200 with a body that is not the expected JSON.
pub fn garbage_source() -> Router {
    Router::new().route("/", get(|| async { "definitely not json" }))
}

/// Answers 202 Accepted with a valid payload.
pub fn accepted_source(numbers: &[i64]) -> Router {
    let numbers = numbers.to_vec();
    Router::new().route(
        "/",
        get(move || {
            let numbers = numbers.clone();
            async move { (StatusCode::ACCEPTED, Json(json!({ "numbers": numbers }))) }
        }),
    )
}

pub fn test_config(deadline_ms: u64, workers: usize) -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        deadline_ms,
        workers,
        attempt_timeout_ms: deadline_ms,
        debug_routes: false,
    }
}

pub fn test_app(deadline_ms: u64, workers: usize) -> Router {
    build_app(&test_config(deadline_ms, workers)).expect("build app")
}

/// `/numbers?u=a&u=b...`
pub fn numbers_uri(sources: &[&str]) -> String {
    if sources.is_empty() {
        return "/numbers".to_string();
    }
    let q: Vec<String> = sources.iter().map(|s| format!("u={s}")).collect();
    format!("/numbers?{}", q.join("&"))
}

pub struct NumbersReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub numbers: Vec<i64>,
    pub raw: String,
}

pub async fn get_numbers(app: Router, sources: &[&str]) -> NumbersReply {
    let req = Request::builder()
        .method("GET")
        .uri(numbers_uri(sources))
        .body(Body::empty())
        .expect("build GET /numbers");
    let resp = app.oneshot(req).await.expect("oneshot /numbers");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let raw = String::from_utf8(bytes).expect("utf8");
    let v: serde_json::Value = serde_json::from_str(&raw).expect("json body");
    let numbers = v
        .get("numbers")
        .and_then(|n| n.as_array())
        .unwrap_or_else(|| panic!("'numbers' must be an array: {raw}"))
        .iter()
        .map(|n| n.as_i64().expect("integer"))
        .collect();
    NumbersReply {
        status,
        headers,
        numbers,
        raw,
    }
}
