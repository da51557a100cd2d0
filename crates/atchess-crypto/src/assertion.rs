//! `private_key_jwt` client assertions
//!
//! The OAuth token endpoint authenticates this service by a JWT signed with
//! its long-lived key, per the `private_key_jwt` client auth method.

use crate::keys::EcdsaKey;
use crate::{random_token, unix_now, CryptoResult};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Assertion lifetime in seconds
const ASSERTION_TTL: u64 = 300;

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
    jti: String,
}

/// Build a client assertion for `audience` (the token endpoint URL)
pub fn client_assertion(key: &EcdsaKey, client_id: &str, audience: &str) -> CryptoResult<String> {
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(key.public_jwk().kid.clone());

    let iat = unix_now();
    let claims = AssertionClaims {
        iss: client_id.to_string(),
        sub: client_id.to_string(),
        aud: audience.to_string(),
        iat,
        exp: iat + ASSERTION_TTL,
        jti: random_token(16),
    };

    let encoding = EncodingKey::from_ec_pem(key.pkcs8_pem().as_bytes())?;
    Ok(encode(&header, &claims, &encoding)?)
}
