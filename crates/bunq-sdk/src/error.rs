//! SDK error types
//!
//! Every failure carries enough context to act on: API errors keep the
//! status, the server-assigned response id and every error description the
//! server returned. Rate limiting is only surfaced after retries run out.

use bunq_crypto::CryptoError;
use bunq_types::{DecodeError, ErrorEnvelope};
use std::fmt;
use thiserror::Error;

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

/// SDK error types
#[derive(Debug, Error)]
pub enum SdkError {
    /// Key generation or encoding failed
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// A handshake step was missing expected data
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    /// The server signature did not match the response body
    #[error("Server signature verification failed (response-id: {response_id}): {source}")]
    ResponseIntegrity {
        response_id: String,
        #[source]
        source: CryptoError,
    },

    /// HTTP 429 persisted through every retry
    #[error("Rate limited after exhausting retries: {0}")]
    RateLimited(ApiError),

    /// Any other non-2xx response
    #[error(transparent)]
    Api(ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SdkError {
    /// HTTP status, for errors that came from a response
    pub fn status_code(&self) -> Option<u16> {
        self.api_error().map(|e| e.status)
    }

    /// The API error, for `Api` and `RateLimited`
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) | Self::RateLimited(e) => Some(e),
            _ => None,
        }
    }

    /// Error category, for errors that came from a response
    pub fn kind(&self) -> Option<ApiErrorKind> {
        self.api_error().map(|e| e.kind)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Whether the caller may reasonably try the whole call again later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Api(e) => e.status >= 500,
            _ => false,
        }
    }
}

/// Status-derived error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    TooManyRequests,
    InternalServerError,
    /// Any status without a dedicated category
    Other,
}

impl ApiErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            405 => Self::MethodNotAllowed,
            429 => Self::TooManyRequests,
            500 => Self::InternalServerError,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::MethodNotAllowed => "method not allowed",
            Self::TooManyRequests => "too many requests",
            Self::InternalServerError => "internal server error",
            Self::Other => "error",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bunq API error {status} {kind} (response-id: {response_id}): {}", .messages.join("; "))]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    /// `X-Bunq-Client-Response-Id`, empty when the server sent none
    pub response_id: String,
    /// Descriptions from the error envelope
    pub messages: Vec<String>,
}

/// Placeholder when the body is not an error envelope
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Classify a failed response by status and error envelope
pub fn classify(status: u16, response_id: Option<&str>, body: &[u8]) -> ApiError {
    let messages = ErrorEnvelope::parse(body)
        .map(|envelope| envelope.messages())
        .unwrap_or_else(|| vec![UNKNOWN_ERROR.to_string()]);

    ApiError {
        kind: ApiErrorKind::from_status(status),
        status,
        response_id: response_id.unwrap_or_default().to_string(),
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let cases = [
            (400, ApiErrorKind::BadRequest),
            (401, ApiErrorKind::Unauthorized),
            (403, ApiErrorKind::Forbidden),
            (404, ApiErrorKind::NotFound),
            (405, ApiErrorKind::MethodNotAllowed),
            (429, ApiErrorKind::TooManyRequests),
            (500, ApiErrorKind::InternalServerError),
            (502, ApiErrorKind::Other),
            (409, ApiErrorKind::Other),
        ];
        for (status, kind) in cases {
            assert_eq!(ApiErrorKind::from_status(status), kind, "status {status}");
        }
    }

    #[test]
    fn test_classify_extracts_messages() {
        let body = br#"{"Error":[{"error_description":"User not found."},{"error_description":"Check the id."}]}"#;
        let err = classify(404, Some("resp-1"), body);

        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.response_id, "resp-1");
        assert_eq!(err.messages, vec!["User not found.", "Check the id."]);
        assert_eq!(
            err.to_string(),
            "bunq API error 404 not found (response-id: resp-1): User not found.; Check the id."
        );
    }

    #[test]
    fn test_classify_keeps_messages_beside_null_entries() {
        let body = br#"{"Error":[{"error_description":"Insufficient balance."},{"error_description":null}]}"#;
        let err = classify(400, None, body);
        assert_eq!(err.messages, vec!["Insufficient balance."]);
    }

    #[test]
    fn test_classify_non_envelope_body() {
        let err = classify(503, None, b"<html>Service Unavailable</html>");
        assert_eq!(err.kind, ApiErrorKind::Other);
        assert_eq!(err.response_id, "");
        assert_eq!(err.messages, vec![UNKNOWN_ERROR]);
    }

    #[test]
    fn test_sdk_error_accessors() {
        let err = SdkError::RateLimited(classify(429, Some("r"), b"{}"));
        assert!(err.is_rate_limited());
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.kind(), Some(ApiErrorKind::TooManyRequests));
        assert!(err.is_retryable());

        assert!(SdkError::Api(classify(502, None, b"")).is_retryable());
        assert!(!SdkError::Api(classify(404, None, b"")).is_retryable());

        let err = SdkError::Bootstrap("no token".to_string());
        assert_eq!(err.status_code(), None);
        assert!(!err.is_retryable());
    }
}
