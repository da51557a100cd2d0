//! Compact JWS signing for JWTs whose header embeds a JWK

use crate::keys::EcdsaKey;
use crate::{b64url, CryptoResult};
use serde_json::Value;

/// Serialize header and claims, sign with ES256, and return the compact JWT
pub(crate) fn sign_compact(key: &EcdsaKey, header: &Value, claims: &Value) -> CryptoResult<String> {
    let signing_input = format!(
        "{}.{}",
        b64url(serde_json::to_string(header).expect("header is JSON").as_bytes()),
        b64url(serde_json::to_string(claims).expect("claims are JSON").as_bytes()),
    );
    let signature = key.sign(signing_input.as_bytes());
    Ok(format!("{signing_input}.{}", b64url(&signature)))
}
