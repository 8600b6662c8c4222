//! Error types shared by the acquisition pipeline.

use thiserror::Error;

/// Errors returned by the quota-limited YouTube Data API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential used for the call has run out of quota.
    #[error("quota exceeded: {reason}")]
    QuotaExceeded {
        /// Response body or message that triggered the classification
        reason: String,
    },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The credential pool is empty.
    #[error("no API credentials configured")]
    NoCredentials,

    /// Any other non-success HTTP status.
    #[error("API returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response could not be mapped into the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Classify a non-success response.
    ///
    /// 403 responses whose body mentions "quota" and all 429 responses are
    /// treated as quota exhaustion.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            403 if body.to_lowercase().contains("quota") => ApiError::QuotaExceeded {
                reason: truncate(body, 200),
            },
            429 => ApiError::QuotaExceeded {
                reason: truncate(body, 200),
            },
            404 => ApiError::NotFound(truncate(body, 200)),
            _ => ApiError::Http {
                status,
                body: truncate(body, 500),
            },
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, ApiError::QuotaExceeded { .. })
    }
}

/// Errors reported by caption sources.
#[derive(Debug, Clone, Error)]
pub enum CaptionError {
    #[error("no matching caption track")]
    NotFound,

    #[error("captions are disabled for this video")]
    Disabled,

    #[error("caption source rate limited")]
    QuotaExceeded,

    #[error("{0}")]
    Transient(String),
}

impl From<reqwest::Error> for CaptionError {
    fn from(e: reqwest::Error) -> Self {
        match e.status().map(|s| s.as_u16()) {
            Some(404) => CaptionError::NotFound,
            Some(429) => CaptionError::QuotaExceeded,
            _ => CaptionError::Transient(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CaptionError {
    fn from(e: serde_json::Error) -> Self {
        CaptionError::Transient(format!("invalid JSON: {e}"))
    }
}

/// Errors that escape the transcript pipeline.
///
/// Everything else is recovered internally by the fetch ladder.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The identifier could not be mapped to a canonical resource.
    #[error("not found: '{identifier}': {reason}")]
    ResolutionFailure {
        /// The identifier as supplied by the caller
        identifier: String,
        /// Why resolution failed
        reason: String,
    },

    /// Every credential in the pool is rate limited.
    #[error("YouTube API quota exhausted for all configured keys")]
    QuotaExhausted,
}

impl TranscriptError {
    pub(crate) fn resolution(identifier: &str, reason: impl Into<String>) -> Self {
        TranscriptError::ResolutionFailure {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }

    /// Map an API error raised while resolving `identifier`.
    pub(crate) fn from_api(identifier: &str, err: ApiError) -> Self {
        match err {
            ApiError::QuotaExceeded { .. } => TranscriptError::QuotaExhausted,
            other => TranscriptError::resolution(identifier, other.to_string()),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_403_is_classified() {
        let body = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your <a>quota</a>."}}"#;
        assert!(ApiError::from_status(403, body).is_quota_exceeded());
    }

    #[test]
    fn test_quota_classification_is_case_insensitive() {
        let body = r#"{"error":{"errors":[{"reason":"QuotaExceeded"}]}}"#;
        assert!(ApiError::from_status(403, body).is_quota_exceeded());
    }

    #[test]
    fn test_plain_403_is_not_quota() {
        let err = ApiError::from_status(403, "forbidden: API key not valid");
        assert!(!err.is_quota_exceeded());
        assert!(matches!(err, ApiError::Http { status: 403, .. }));
    }

    #[test]
    fn test_429_is_quota() {
        assert!(ApiError::from_status(429, "slow down").is_quota_exceeded());
    }

    #[test]
    fn test_404_is_not_found() {
        assert!(matches!(ApiError::from_status(404, ""), ApiError::NotFound(_)));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(1000);
        match ApiError::from_status(500, &body) {
            ApiError::Http { body, .. } => assert_eq!(body.len(), 503),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transcript_error_from_quota() {
        let err = TranscriptError::from_api(
            "@x",
            ApiError::QuotaExceeded {
                reason: "quota".to_string(),
            },
        );
        assert!(matches!(err, TranscriptError::QuotaExhausted));
    }

    #[test]
    fn test_transcript_error_from_other() {
        let err = TranscriptError::from_api("@x", ApiError::NotFound("channel".to_string()));
        assert!(matches!(err, TranscriptError::ResolutionFailure { .. }));
        assert!(err.to_string().starts_with("not found: '@x'"));
    }
}
