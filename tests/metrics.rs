// tests/metrics.rs
mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use numbers_aggregator::build_app;

#[tokio::test]
async fn metrics_route_only_with_debug_routes() {
    let app = common::test_app(200, 2);
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_endpoint_reports_aggregation_series() {
    let mut cfg = common::test_config(200, 2);
    cfg.debug_routes = true;
    let app = build_app(&cfg).expect("app with metrics");

    // One rejected source and one request counted.
    let r = common::get_numbers(app.clone(), &["hello"]).await;
    assert_eq!(r.status, StatusCode::OK);

    let m = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(m.status(), StatusCode::OK);
    let body = body::to_bytes(m.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in ["numbers_requests_total", "numbers_sources_rejected_total"] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
