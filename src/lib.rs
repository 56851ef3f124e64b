// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;

use crate::aggregate::{HttpTransport, NumbersService};
use crate::api::AppState;
use crate::config::AppConfig;
use crate::telemetry::Metrics;

pub use crate::api::router;

/// Build the full router from an explicit config: shared HTTP transport,
/// `/numbers`, and `/metrics` when debug routes are enabled.
pub fn build_app(cfg: &AppConfig) -> Result<Router> {
    let metrics = if cfg.debug_routes {
        Some(Metrics::init()?)
    } else {
        None
    };

    let transport = HttpTransport::new(cfg.workers, cfg.attempt_timeout())?;
    let service = NumbersService::new(Arc::new(transport), cfg.fan_out());
    let mut app = router(AppState { numbers: service });
    if let Some(m) = metrics {
        app = app.merge(m.router());
    }
    Ok(app)
}

/// Same as [`build_app`], with config loaded from file + env.
pub async fn app() -> Result<Router> {
    let cfg = AppConfig::load()?;
    build_app(&cfg)
}
