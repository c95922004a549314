//! Key management for the installation handshake

use crate::{CryptoError, CryptoResult};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding};
use sha2::{Digest, Sha256};
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Modulus size used when none is requested
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Smallest modulus the server accepts
pub const MIN_KEY_BITS: usize = 2048;

/// An RSA key pair for signing requests
///
/// Generated once per client and never mutated afterwards.
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random 2048-bit key pair
    pub fn generate() -> CryptoResult<Self> {
        Self::generate_with_bits(DEFAULT_KEY_BITS)
    }

    /// Generate a new random key pair with the given modulus size
    pub fn generate_with_bits(bits: usize) -> CryptoResult<Self> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::KeyGenerationFailed(format!(
                "key size {bits} is below the {MIN_KEY_BITS}-bit minimum"
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let public_key = PublicKey(private_key.to_public_key());

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Get the private key (never expose!)
    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// An RSA public key (ours or the server's)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Encode as PKCS#1 PEM (`-----BEGIN RSA PUBLIC KEY-----`)
    pub fn to_pem(&self) -> CryptoResult<String> {
        self.0
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
    }

    /// Decode a PEM public key
    ///
    /// PKCS#1 (`RSA PUBLIC KEY`) is tried first, then SPKI (`PUBLIC KEY`),
    /// which is what the server sends back.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let pem = pem.trim();
        RsaPublicKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
            .map(Self)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
    }

    /// SHA-256 over the PKCS#1 DER encoding, hex encoded
    pub fn fingerprint(&self) -> CryptoResult<String> {
        let der = self
            .0
            .to_pkcs1_der()
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(der.as_bytes())))
    }

    /// Modulus size in bits
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    pub(crate) fn inner(&self) -> &RsaPublicKey {
        &self.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rsa::pkcs8::EncodePublicKey;
    use std::sync::OnceLock;

    /// One shared key pair; RSA generation dominates test time otherwise.
    pub(crate) fn shared_keypair() -> &'static KeyPair {
        static KEYPAIR: OnceLock<KeyPair> = OnceLock::new();
        KEYPAIR.get_or_init(|| KeyPair::generate().unwrap())
    }

    #[test]
    fn test_keypair_generation() {
        let keypair = shared_keypair();
        assert_eq!(keypair.public_key().bits(), 2048);
    }

    #[test]
    fn test_small_keys_rejected() {
        let err = KeyPair::generate_with_bits(1024).unwrap_err();
        assert!(matches!(err, CryptoError::KeyGenerationFailed(_)));
    }

    #[test]
    fn test_public_key_pem_roundtrip() {
        let public = shared_keypair().public_key();
        let pem = public.to_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----"));

        let decoded = PublicKey::from_pem(&pem).unwrap();
        assert_eq!(&decoded, public);
    }

    #[test]
    fn test_spki_pem_accepted() {
        let public = shared_keypair().public_key();
        let spki = public.inner().to_public_key_pem(LineEnding::LF).unwrap();
        assert!(spki.starts_with("-----BEGIN PUBLIC KEY-----"));

        assert_eq!(&PublicKey::from_pem(&spki).unwrap(), public);
    }

    #[test]
    fn test_malformed_pem_rejected() {
        for input in ["", "not a key", "-----BEGIN RSA PUBLIC KEY-----\nAAAA\n-----END RSA PUBLIC KEY-----"] {
            assert!(matches!(
                PublicKey::from_pem(input),
                Err(CryptoError::InvalidKeyFormat(_))
            ));
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let public = shared_keypair().public_key();
        let fp = public.fingerprint().unwrap();
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, public.fingerprint().unwrap());
    }

    #[test]
    fn test_debug_hides_private_key() {
        let rendered = format!("{:?}", shared_keypair());
        assert!(rendered.starts_with("KeyPair"));
        assert!(!rendered.contains("private"));
    }
}
