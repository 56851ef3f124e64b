// src/aggregate/types.rs
use serde::{Deserialize, Serialize};
use url::Url;

/// Wire shape shared by every source and by our own `/numbers` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumbersPayload {
    #[serde(default)]
    pub numbers: Vec<i64>,
}

/// Decoded payload of one source. Values may repeat as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    pub source: Url,
    pub numbers: Vec<i64>,
}

/// Why a single source contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("could not build request: {0}")]
    InvalidRequest(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("decoding error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Stable label for logs and metric series.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::InvalidRequest(_) => "invalid_request",
            FetchError::Transport(_) => "transport",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// A failed source, kept for observability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: Url,
    pub reason: FetchError,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.source, self.reason)
    }
}

/// One request/response cycle against a source. Implementations are shared
/// read-only by every worker, so they must be cheap to call concurrently.
///
/// Cancellation is handled by the caller dropping the returned future, so an
/// implementation must release its connection when dropped mid-flight.
#[async_trait::async_trait]
pub trait SourceTransport: Send + Sync {
    async fn fetch(&self, source: &Url) -> Result<Vec<i64>, FetchError>;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_tolerates_missing_and_extra_fields() {
        let p: NumbersPayload = serde_json::from_str(r#"{"numbers":[3,1],"extra":true}"#).unwrap();
        assert_eq!(p.numbers, vec![3, 1]);
        let empty: NumbersPayload = serde_json::from_str("{}").unwrap();
        assert!(empty.numbers.is_empty());
    }

    #[test]
    fn empty_payload_serializes_as_array_not_null() {
        let s = serde_json::to_string(&NumbersPayload::default()).unwrap();
        assert_eq!(s, r#"{"numbers":[]}"#);
    }

    #[test]
    fn failure_display_names_source_and_reason() {
        let f = SourceFailure {
            source: Url::parse("http://a.example/x").unwrap(),
            reason: FetchError::Status(503),
        };
        assert_eq!(f.to_string(), "http://a.example/x - server returned status 503");
        assert_eq!(f.reason.kind(), "status");
    }
}
