// src/aggregate/validate.rs
//! Syntactic checks on source identifiers, done before any network work.

use metrics::counter;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty source reference")]
    Empty,
    #[error("unparsable source reference: {0}")]
    Unparsable(String),
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("source reference has no host")]
    MissingHost,
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_source(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    let url = Url::parse(trimmed).map_err(|e| ValidationError::Unparsable(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme(url.scheme().to_string()));
    }
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(url),
        _ => Err(ValidationError::MissingHost),
    }
}

/// Split a source list into accepted URLs (input order kept, duplicates kept)
/// and a count of rejected entries. Rejections are logged here.
pub fn partition_sources<S: AsRef<str>>(sources: &[S]) -> (Vec<Url>, usize) {
    let mut accepted = Vec::with_capacity(sources.len());
    let mut rejected = 0usize;
    for raw in sources {
        let raw = raw.as_ref();
        match validate_source(raw) {
            Ok(url) => accepted.push(url),
            Err(e) => {
                rejected += 1;
                tracing::warn!(target: "aggregate", source = raw, reason = %e, "rejected source");
                counter!("numbers_sources_rejected_total").increment(1);
            }
        }
    }
    (accepted, rejected)
}
