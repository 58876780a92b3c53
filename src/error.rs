//! Error types for batch image generation.

use std::time::Duration;

/// Errors that can occur while reading prompts or generating images.
#[derive(Debug, thiserror::Error)]
pub enum SheetVizError {
    /// Input file missing or unusable (fatal for the run).
    #[error("input error: {0}")]
    Input(String),

    /// Spreadsheet could not be opened or parsed.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Configuration file missing, malformed or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Request rejected as malformed by the vendor.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Request or task polling timed out.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Received bytes are not a valid image, or base64 did not decode.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Response did not match any known layout.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Asynchronous task reached the FAILED state.
    #[error("task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a failed attempt should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429 or vendor throttling. Wait, then retry.
    RateLimited,
    /// Bad or missing credential. Never retried.
    Unauthorized,
    /// Malformed request. Never retried.
    BadRequest,
    /// Request or poll timeout. Backoff, then retry.
    Timeout,
    /// Anything else. Backoff, then retry.
    Unknown,
}

impl FailureKind {
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthorized | Self::BadRequest)
    }
}

impl SheetVizError {
    /// Classifies this error for the retry loop.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Auth(_) => FailureKind::Unauthorized,
            Self::InvalidRequest(_) => FailureKind::BadRequest,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Network(e) if e.is_timeout() => FailureKind::Timeout,
            _ => FailureKind::Unknown,
        }
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_retryable()
    }

    /// Returns the vendor-suggested retry delay, if one was sent.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns true for errors that abort a run before any network activity.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Spreadsheet(_) | Self::Config(_))
    }

    /// Maps a non-success HTTP status and body to an error.
    ///
    /// Shared by all providers: 401/403 are credential problems, 400 is a
    /// malformed request, 429 is throttling.
    pub fn from_status(status: u16, body: &str, headers: &reqwest::header::HeaderMap) -> Self {
        let message = sanitize_error_message(body);
        match status {
            401 | 403 => Self::Auth(message),
            400 => Self::InvalidRequest(message),
            429 => Self::RateLimited {
                retry_after: parse_retry_after(headers).map(Duration::from_secs),
            },
            _ => Self::Api { status, message },
        }
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, SheetVizError>;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Masks bearer tokens and API keys and caps the length of an error body.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let masked: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let bare = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
            if bare.starts_with("sk-") && bare.len() > 8 {
                word.replace(bare, "sk-***")
            } else {
                word.to_string()
            }
        })
        .collect();
    let mut out = masked.join(" ");
    if let Some(pos) = out.find("Bearer ") {
        let end = out[pos + 7..]
            .find(char::is_whitespace)
            .map(|i| pos + 7 + i)
            .unwrap_or(out.len());
        out.replace_range(pos + 7..end, "***");
    }
    if out.chars().count() > MAX_ERROR_MESSAGE_LEN {
        out = out.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        out.push_str("...");
    }
    out
}

/// Reads a numeric `Retry-After` header (seconds).
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_failure_kind() {
        assert_eq!(
            SheetVizError::RateLimited { retry_after: None }.failure_kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            SheetVizError::Auth("bad key".into()).failure_kind(),
            FailureKind::Unauthorized
        );
        assert_eq!(
            SheetVizError::InvalidRequest("bad size".into()).failure_kind(),
            FailureKind::BadRequest
        );
        assert_eq!(
            SheetVizError::Timeout(Duration::from_secs(30)).failure_kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            SheetVizError::Decode("not an image".into()).failure_kind(),
            FailureKind::Unknown
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(SheetVizError::RateLimited { retry_after: None }.is_retryable());
        assert!(SheetVizError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(SheetVizError::Decode("bad base64".into()).is_retryable());
        assert!(SheetVizError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());

        assert!(!SheetVizError::Auth("bad key".into()).is_retryable());
        assert!(!SheetVizError::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_from_status() {
        let headers = HeaderMap::new();
        assert!(matches!(
            SheetVizError::from_status(401, "nope", &headers),
            SheetVizError::Auth(_)
        ));
        assert!(matches!(
            SheetVizError::from_status(403, "nope", &headers),
            SheetVizError::Auth(_)
        ));
        assert!(matches!(
            SheetVizError::from_status(400, "bad", &headers),
            SheetVizError::InvalidRequest(_)
        ));
        assert!(matches!(
            SheetVizError::from_status(503, "down", &headers),
            SheetVizError::Api { status: 503, .. }
        ));

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        let err = SheetVizError::from_status(429, "slow down", &headers);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_sanitize_masks_secrets() {
        let msg = sanitize_error_message("invalid key sk-1234567890abcdef supplied");
        assert!(!msg.contains("1234567890"));
        assert!(msg.contains("sk-***"));

        let msg = sanitize_error_message("header was Bearer abc.def.ghi rejected");
        assert_eq!(msg, "header was Bearer *** rejected");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(2000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.len(), MAX_ERROR_MESSAGE_LEN + 3);
    }

    #[test]
    fn test_error_display() {
        let err = SheetVizError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = SheetVizError::TaskFailed {
            task_id: "t-1".into(),
            reason: "InternalError".into(),
        };
        assert_eq!(err.to_string(), "task t-1 failed: InternalError");
    }
}
