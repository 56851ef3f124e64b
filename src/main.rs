//! Numbers aggregator — binary entrypoint.
//! Loads config, boots the Axum server, and shuts down on Ctrl-C / SIGTERM.

use anyhow::{Context, Result};
use numbers_aggregator::{build_app, config::AppConfig, telemetry};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        addr = %cfg.listen_addr,
        deadline_ms = cfg.deadline_ms,
        workers = cfg.workers,
        attempt_timeout_ms = cfg.attempt_timeout_ms,
        "starting numbers aggregator"
    );

    let app = build_app(&cfg)?;
    let listener = TcpListener::bind(cfg.listen_addr.as_str())
        .await
        .with_context(|| format!("binding {}", cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
