//! bunq Crypto - Cryptographic primitives for the bunq client
//!
//! This crate provides:
//! - RSA key pair generation and PEM encoding (installation handshake)
//! - Request/response signatures (SHA-256 + RSASSA-PKCS1-v1_5, base64)
//!
//! # Security Invariant
//!
//! **The private key never leaves the [`KeyPair`].** Only the public half can
//! be encoded; signing happens in place.

pub mod keys;
pub mod signature;

pub use keys::*;
pub use signature::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The signature decoded but does not match the message
    #[error("Signature does not match message")]
    SignatureInvalid,

    #[error("Invalid signature encoding: {0}")]
    InvalidSignatureEncoding(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
