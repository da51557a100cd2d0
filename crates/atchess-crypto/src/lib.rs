//! Key material and proof-of-possession primitives
//!
//! Everything the OAuth + DPoP stack signs goes through here: the service's
//! long-lived P-256 keypair, per-session DPoP keys, DPoP proof JWTs, the
//! `private_key_jwt` client assertion, and PKCE pairs.

pub mod assertion;
pub mod dpop;
mod jws;
pub mod keys;
pub mod pkce;

pub use assertion::client_assertion;
pub use dpop::dpop_proof;
pub use keys::{EcdsaKey, PublicJwk};
pub use pkce::{generate_pair, PkcePair};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

/// Errors from key loading and token signing
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material missing or not a valid P-256 private key
    #[error("Invalid key material: {reason}")]
    InvalidKey { reason: String },

    /// Reading a key file failed
    #[error("Key I/O error: {0}")]
    KeyIo(#[from] std::io::Error),

    /// JWT signing failed
    #[error("JWT signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Result type alias for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Base64url without padding, the encoding everything in this crate speaks
pub(crate) fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Random base64url token of `len` source bytes (16 bytes = 128 bits)
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    b64url(&bytes)
}

/// Unix timestamp in seconds
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_token_length_and_uniqueness() {
        let token = random_token(16);
        assert_eq!(token.len(), 22); // 16 bytes -> 22 base64url chars
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(random_token(16)));
        }
    }
}
