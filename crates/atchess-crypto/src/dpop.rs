//! DPoP proof JWTs (RFC 9449)
//!
//! A proof binds one HTTP request to the holder of a private key. The
//! server learns the key from the `jwk` header member and checks `htm`,
//! `htu`, freshness, and (when an access token rides along) `ath`.

use crate::jws::sign_compact;
use crate::keys::EcdsaKey;
use crate::{b64url, random_token, unix_now, CryptoResult};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Proof lifetime in seconds
const PROOF_TTL: u64 = 300;

/// Build a DPoP proof for `method` against `url`.
///
/// `access_token` adds the `ath` claim binding the proof to that token;
/// `nonce` echoes a server-issued nonce after a `use_dpop_nonce` bounce.
pub fn dpop_proof(
    key: &EcdsaKey,
    method: &str,
    url: &str,
    access_token: Option<&str>,
    nonce: Option<&str>,
) -> CryptoResult<String> {
    let jwk = key.public_jwk();
    let header = json!({
        "typ": "dpop+jwt",
        "alg": "ES256",
        "jwk": {
            "kty": jwk.kty,
            "crv": jwk.crv,
            "x": jwk.x,
            "y": jwk.y,
        },
    });

    let iat = unix_now();
    let mut claims = json!({
        "jti": random_token(16),
        "htm": method.to_uppercase(),
        "htu": strip_query(url),
        "iat": iat,
        "exp": iat + PROOF_TTL,
    });
    if let Some(token) = access_token {
        claims["ath"] = json!(b64url(&Sha256::digest(token.as_bytes())));
    }
    if let Some(nonce) = nonce {
        claims["nonce"] = json!(nonce);
    }

    sign_compact(key, &header, &claims)
}

/// `htu` is the URI without query or fragment
fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::Value;

    fn decode_part(part: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_proof_structure() {
        let key = EcdsaKey::generate();
        let proof = dpop_proof(&key, "post", "https://pds.example/xrpc/op?x=1", None, None).unwrap();

        let parts: Vec<&str> = proof.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_part(parts[0]);
        assert_eq!(header["typ"], "dpop+jwt");
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["jwk"]["kty"], "EC");
        assert_eq!(header["jwk"]["crv"], "P-256");
        assert!(header["jwk"].get("d").is_none());

        let claims = decode_part(parts[1]);
        assert_eq!(claims["htm"], "POST");
        assert_eq!(claims["htu"], "https://pds.example/xrpc/op");
        assert_eq!(
            claims["exp"].as_u64().unwrap() - claims["iat"].as_u64().unwrap(),
            PROOF_TTL
        );
        assert!(claims.get("ath").is_none());
        assert!(claims.get("nonce").is_none());
    }

    #[test]
    fn test_ath_binds_access_token() {
        let key = EcdsaKey::generate();
        let proof = dpop_proof(&key, "GET", "https://pds.example/xrpc/op", Some("tok"), None)
            .unwrap();
        let claims = decode_part(proof.split('.').nth(1).unwrap());
        assert_eq!(
            claims["ath"],
            b64url(&Sha256::digest(b"tok".as_slice()))
        );
    }

    #[test]
    fn test_nonce_is_echoed() {
        let key = EcdsaKey::generate();
        let proof = dpop_proof(
            &key,
            "POST",
            "https://auth.example/token",
            None,
            Some("server-nonce"),
        )
        .unwrap();
        let claims = decode_part(proof.split('.').nth(1).unwrap());
        assert_eq!(claims["nonce"], "server-nonce");
    }

    #[test]
    fn test_jti_unique_per_proof() {
        let key = EcdsaKey::generate();
        let a = dpop_proof(&key, "GET", "https://x.example/", None, None).unwrap();
        let b = dpop_proof(&key, "GET", "https://x.example/", None, None).unwrap();
        let jti = |p: &str| decode_part(p.split('.').nth(1).unwrap())["jti"].clone();
        assert_ne!(jti(&a), jti(&b));
    }
}
