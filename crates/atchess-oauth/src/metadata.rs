//! The client-metadata document this service publishes
//!
//! Authorization servers fetch this JSON from `client_id` (which is its own
//! URL) to learn the redirect URIs, auth method, and signing keys.

use atchess_crypto::PublicJwk;
use serde_json::{json, Value};

/// Build the document served at `/client-metadata.json`
pub fn client_metadata(public_base_url: &str, jwk: &PublicJwk) -> Value {
    let base = public_base_url.trim_end_matches('/');
    json!({
        "client_id": format!("{base}/client-metadata.json"),
        "client_name": "ATChess",
        "client_uri": base,
        "redirect_uris": [format!("{base}/oauth/callback")],
        "scope": "atproto transition:generic",
        "grant_types": ["authorization_code", "refresh_token"],
        "response_types": ["code"],
        "application_type": "web",
        "token_endpoint_auth_method": "private_key_jwt",
        "token_endpoint_auth_signing_alg": "ES256",
        "dpop_bound_access_tokens": true,
        "jwks": { "keys": [jwk] },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atchess_crypto::EcdsaKey;

    #[test]
    fn test_metadata_shape() {
        let key = EcdsaKey::generate();
        let doc = client_metadata("https://chess.example.com/", key.public_jwk());

        assert_eq!(
            doc["client_id"],
            "https://chess.example.com/client-metadata.json"
        );
        assert_eq!(
            doc["redirect_uris"][0],
            "https://chess.example.com/oauth/callback"
        );
        assert_eq!(doc["token_endpoint_auth_method"], "private_key_jwt");
        assert_eq!(doc["token_endpoint_auth_signing_alg"], "ES256");
        assert_eq!(doc["dpop_bound_access_tokens"], true);
        assert_eq!(doc["scope"], "atproto transition:generic");
        assert_eq!(doc["jwks"]["keys"][0]["kty"], "EC");
        assert_eq!(doc["jwks"]["keys"][0]["kid"], key.public_jwk().kid.as_str());
        // Private material never leaves the process
        assert!(doc["jwks"]["keys"][0].get("d").is_none());
    }
}
