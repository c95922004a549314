//! Error types for envelope decoding
//!
//! Decode failures are recoverable: a missing key or an unexpected shape is
//! reported to the caller, never a panic.

use thiserror::Error;

/// Result type for decode operations
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Envelope decode errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body is not a valid response envelope
    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// `Response` array was present but empty
    #[error("Empty response array")]
    EmptyResponse,

    /// No entry matched the requested key (exactly or by prefix)
    #[error("Key {key:?} not found in response")]
    KeyNotFound { key: String },

    /// A payload was found but did not match the target shape
    #[error("Failed to decode {key}: {source}")]
    Shape {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Create a key-not-found error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Create a shape error for the given key
    pub fn shape(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Shape {
            key: key.into(),
            source,
        }
    }
}
