// src/aggregate/fetch.rs
//! Fetch worker: one GET per source, raced against the request's deadline token.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{FetchError, NumbersPayload, SourceFailure, SourceResult, SourceTransport};

/// Terminal outcome of a single fetch. `Cancelled` means the deadline won the
/// race and nothing is reported for this source.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(SourceResult),
    Failed(SourceFailure),
    Cancelled,
}

/// Perform one request/response cycle for `source` unless `token` fires first.
/// Dropping the transport future on cancellation aborts the in-flight request.
pub async fn fetch_source(
    transport: &dyn SourceTransport,
    source: Url,
    token: &CancellationToken,
) -> FetchOutcome {
    if token.is_cancelled() {
        return FetchOutcome::Cancelled;
    }

    let res = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        res = transport.fetch(&source) => Some(res),
    };

    match res {
        Some(Ok(numbers)) => FetchOutcome::Fetched(SourceResult { source, numbers }),
        Some(Err(reason)) => FetchOutcome::Failed(SourceFailure { source, reason }),
        None => {
            tracing::debug!(target: "aggregate", source = %source, "fetch abandoned");
            FetchOutcome::Cancelled
        }
    }
}

/// reqwest-backed transport. One instance is built at startup and its
/// connection pool is reused by every worker of every request.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(pool_per_host: usize, attempt_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("numbers-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(attempt_timeout)
            .timeout(attempt_timeout)
            .pool_max_idle_per_host(pool_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("building source http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceTransport for HttpTransport {
    async fn fetch(&self, source: &Url) -> Result<Vec<i64>, FetchError> {
        let resp = self
            .client
            .get(source.clone())
            .send()
            .await
            .map_err(classify_send_error)?;

        // Any 2xx counts as success.
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let payload: NumbersPayload =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(payload.numbers)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn classify_send_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::InvalidRequest(e.to_string())
    } else {
        FetchError::Transport(e.to_string())
    }
}
