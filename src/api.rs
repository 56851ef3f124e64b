// src/api.rs
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::aggregate::{NumbersPayload, NumbersService};

pub const NUMBERS_PATH: &str = "/numbers";
/// Repeated query key carrying one source URL each.
pub const SOURCE_PARAM: &str = "u";

pub const HEADER_SOURCES_FAILED: &str = "x-sources-failed";
pub const HEADER_DEADLINE_EXCEEDED: &str = "x-deadline-exceeded";

#[derive(Clone)]
pub struct AppState {
    pub numbers: NumbersService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // `get` would also answer HEAD; only GET reaches the aggregator.
        .route(
            NUMBERS_PATH,
            get(numbers)
                .head(method_not_supported)
                .fallback(method_not_supported),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// All `u` values in order, URL-decoded, duplicates kept.
pub fn source_params(query: Option<&str>) -> Vec<String> {
    let Some(q) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(q.as_bytes())
        .filter(|(k, _)| k == SOURCE_PARAM)
        .map(|(_, v)| v.into_owned())
        .collect()
}

async fn numbers(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let sources = source_params(query.as_deref());

    // Cancelled when this future is dropped, i.e. when the client goes away.
    let caller = CancellationToken::new();
    let _disconnect = caller.clone().drop_guard();

    let agg = state.numbers.aggregate(&sources, &caller).await;

    let headers = [
        (HEADER_SOURCES_FAILED, agg.unusable_sources().to_string()),
        (
            HEADER_DEADLINE_EXCEEDED,
            if agg.deadline_exceeded { "1" } else { "0" }.to_string(),
        ),
    ];
    (
        headers,
        Json(NumbersPayload {
            numbers: agg.numbers,
        }),
    )
        .into_response()
}

async fn method_not_supported() -> (StatusCode, &'static str) {
    (StatusCode::FORBIDDEN, "403 - Method not supported!")
}
