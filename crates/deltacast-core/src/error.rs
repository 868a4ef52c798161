//! Error types for the streaming pipeline

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used by the pipeline and the HTTP client
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that terminate a pipeline or prevent it from starting.
///
/// Malformed SSE framing is not represented here: offending lines are
/// skipped by the parser and never fail the stream.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An event's data field was not a valid delta payload
    #[error("Failed to parse delta payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The upstream answered with a non-success status
    #[error("Upstream error: status={status}, body={body}")]
    Upstream { status: StatusCode, body: String },

    /// The request could not be sent or its body could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The inbound byte stream failed after streaming started
    #[error("Inbound stream failed: {0}")]
    Transport(String),

    /// The asynchronous transform step failed
    #[error("Transform failed: {0}")]
    Transform(#[source] anyhow::Error),

    /// Invalid client or pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Whether this error was raised before any output stream existed
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = PipelineError::from(err);
        assert!(matches!(err, PipelineError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse delta payload"));
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_upstream_display() {
        let err = PipelineError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            body: "bad key".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upstream error: status=401 Unauthorized, body=bad key"
        );
        assert!(err.is_upstream());
    }
}
