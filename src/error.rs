//! Error taxonomy for the crawl pipeline.
//!
//! Fetch failures are classified retryable vs terminal at this layer so the
//! orchestrator's retry loop never inspects transport internals. Per-record
//! parse failures are swallowed and counted by the adapters; only a
//! structurally unusable payload surfaces as [`ParseError`]. Nothing below
//! a total-run failure propagates past the orchestrator boundary.

use thiserror::Error;

/// Failure while fetching a source payload.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,

    #[error("local payload not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl FetchError {
    /// Transient failures worth retrying: timeout, connection reset,
    /// 5xx, and upstream 429. Any other 4xx is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Connection(_) | FetchError::RateLimited => true,
            FetchError::Status(code) => *code >= 500,
            FetchError::NotFound(_) | FetchError::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                FetchError::RateLimited
            } else {
                FetchError::Status(status.as_u16())
            }
        } else {
            FetchError::Other(err.to_string())
        }
    }
}

/// The payload was fetched but its overall structure is unusable.
/// Individual malformed records inside a well-formed payload are skipped
/// and counted instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("malformed CSV: {0}")]
    Csv(String),

    #[error("payload is not valid UTF-8")]
    Encoding,

    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

/// Failure of a whole crawl for one source: fetch retries exhausted or the
/// payload could not be parsed at all. Downgraded to a status flag by the
/// orchestrator, never raised past it.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// The only hard error a run can surface: zero sources succeeded.
#[derive(Debug, Error)]
#[error("all {attempted} sources failed; nothing to reconcile")]
pub struct RunFailure {
    pub attempted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Connection("reset".into()).is_retryable());
        assert!(FetchError::RateLimited.is_retryable());
        assert!(FetchError::Status(500).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Status(403).is_retryable());
        assert!(!FetchError::NotFound("x".into()).is_retryable());
    }
}
