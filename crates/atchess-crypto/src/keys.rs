//! P-256 ECDSA keypairs
//!
//! The service holds one long-lived key for OAuth client authentication;
//! every browser login additionally gets a fresh session key that its
//! access token is DPoP-bound to.

use crate::{b64url, CryptoError, CryptoResult};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use p256::SecretKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Public half of a key as a JWK, the shape OAuth servers expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    #[serde(rename = "use")]
    pub usage: String,
    pub alg: String,
    pub kid: String,
}

/// A P-256 ECDSA private key plus its derived public JWK
#[derive(Clone)]
pub struct EcdsaKey {
    signing: SigningKey,
    pkcs8_pem: String,
    jwk: PublicJwk,
}

impl std::fmt::Debug for EcdsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdsaKey")
            .field("kid", &self.jwk.kid)
            .finish_non_exhaustive()
    }
}

impl EcdsaKey {
    /// Parse a PEM private key, accepting both PKCS#8 and SEC1 encodings
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let secret = SecretKey::from_pkcs8_pem(pem)
            .or_else(|_| SecretKey::from_sec1_pem(pem))
            .map_err(|e| CryptoError::InvalidKey {
                reason: format!("not a P-256 private key PEM: {e}"),
            })?;
        Self::from_secret(secret)
    }

    /// Load the service key: the file at `path` if given, otherwise the
    /// PEM in the `env_var` environment variable. Startup fails without
    /// one of the two.
    pub fn load(path: Option<&Path>, env_var: &str) -> CryptoResult<Self> {
        if let Some(path) = path {
            let pem = std::fs::read_to_string(path)?;
            return Self::from_pem(&pem);
        }
        match std::env::var(env_var) {
            Ok(pem) => Self::from_pem(&pem),
            Err(_) => Err(CryptoError::InvalidKey {
                reason: format!("no key file configured and {env_var} is unset"),
            }),
        }
    }

    /// Mint a fresh random key (used per OAuth session)
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        loop {
            rand::rng().fill_bytes(&mut bytes);
            // Rejection-sample scalars outside the field order
            if let Ok(secret) = SecretKey::from_slice(&bytes) {
                return Self::from_secret(secret).expect("freshly sampled key is valid");
            }
        }
    }

    fn from_secret(secret: SecretKey) -> CryptoResult<Self> {
        let pkcs8_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey {
                reason: format!("PKCS#8 re-encode failed: {e}"),
            })?
            .to_string();

        let point = secret.public_key().to_encoded_point(false);
        let x = b64url(point.x().expect("uncompressed point has x"));
        let y = b64url(point.y().expect("uncompressed point has y"));
        let kid = thumbprint(&x, &y);

        Ok(Self {
            signing: SigningKey::from(secret),
            pkcs8_pem,
            jwk: PublicJwk {
                kty: "EC".to_string(),
                crv: "P-256".to_string(),
                x,
                y,
                usage: "sig".to_string(),
                alg: "ES256".to_string(),
                kid,
            },
        })
    }

    /// Public JWK with a stable kid (the RFC 7638 thumbprint)
    pub fn public_jwk(&self) -> &PublicJwk {
        &self.jwk
    }

    /// PKCS#8 PEM of the private key, for handing to the JWT encoder
    pub fn pkcs8_pem(&self) -> &str {
        &self.pkcs8_pem
    }

    /// Raw ES256 signature (64-byte r || s) over `data`
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let signature: Signature = self.signing.sign(data);
        signature.to_bytes().to_vec()
    }
}

/// RFC 7638 JWK thumbprint over the required EC members in lexicographic
/// order, with no whitespace
fn thumbprint(x: &str, y: &str) -> String {
    let canonical = format!(r#"{{"crv":"P-256","kty":"EC","x":"{x}","y":"{y}"}}"#);
    b64url(&Sha256::digest(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::VerifyingKey;

    #[test]
    fn test_generate_produces_valid_jwk() {
        let key = EcdsaKey::generate();
        let jwk = key.public_jwk();
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "P-256");
        assert_eq!(jwk.usage, "sig");
        assert_eq!(jwk.alg, "ES256");
        assert_eq!(jwk.x.len(), 43); // 32 bytes base64url
        assert_eq!(jwk.y.len(), 43);
        assert!(!jwk.kid.is_empty());
    }

    #[test]
    fn test_pem_round_trip_keeps_kid_stable() {
        let key = EcdsaKey::generate();
        let reloaded = EcdsaKey::from_pem(key.pkcs8_pem()).unwrap();
        assert_eq!(reloaded.public_jwk(), key.public_jwk());
    }

    #[test]
    fn test_garbage_pem_rejected() {
        assert!(EcdsaKey::from_pem("not a pem").is_err());
        assert!(EcdsaKey::from_pem("").is_err());
    }

    #[test]
    fn test_signature_verifies() {
        let key = EcdsaKey::generate();
        let sig_bytes = key.sign(b"signing input");
        assert_eq!(sig_bytes.len(), 64);

        let verifying = VerifyingKey::from(&key.signing);
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        assert!(verifying.verify(b"signing input", &signature).is_ok());
        assert!(verifying.verify(b"other input", &signature).is_err());
    }

    #[test]
    fn test_distinct_keys_have_distinct_kids() {
        let a = EcdsaKey::generate();
        let b = EcdsaKey::generate();
        assert_ne!(a.public_jwk().kid, b.public_jwk().kid);
    }
}
