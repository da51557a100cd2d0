//! Wire types for the XRPC surface

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How requests carry the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: DPoP <token>` plus a fresh proof header per request
    Dpop,
}

/// `(uri, cid)` pair returned by every write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

/// A record read back from a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRecord {
    pub uri: String,
    pub cid: String,
    pub value: Value,
}

/// Result of `com.atproto.server.createSession`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdrSession {
    #[serde(rename = "accessJwt")]
    pub access_jwt: String,
    #[serde(rename = "refreshJwt")]
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_parses_host_response() {
        let session: PdrSession = serde_json::from_value(json!({
            "accessJwt": "access",
            "refreshJwt": "refresh",
            "did": "did:plc:abc",
            "handle": "alice.example.com",
        }))
        .unwrap();
        assert_eq!(session.did, "did:plc:abc");
        assert_eq!(session.access_jwt, "access");
    }
}
