//! Request and response signatures
//!
//! SHA-256 digest of the raw body, signed with RSASSA-PKCS1-v1_5 and
//! transported as standard base64.

use crate::{CryptoError, CryptoResult, KeyPair, PublicKey};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

/// Sign a message body, returning the base64 signature
pub fn sign(keypair: &KeyPair, message: &[u8]) -> CryptoResult<String> {
    let digest = body_digest(message);
    let signature = keypair
        .private_key()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    Ok(STANDARD.encode(signature))
}

/// Verify a base64 signature over a message body
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &str) -> CryptoResult<()> {
    let raw = STANDARD
        .decode(signature.trim())
        .map_err(|e| CryptoError::InvalidSignatureEncoding(e.to_string()))?;
    let digest = body_digest(message);

    public_key
        .inner()
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &raw)
        .map_err(|_| CryptoError::SignatureInvalid)
}

/// Digest the server and client sign: SHA-256 over the exact body bytes,
/// so `{}` and `{ }` are different messages
fn body_digest(body: &[u8]) -> [u8; 32] {
    Sha256::digest(body).into()
}
