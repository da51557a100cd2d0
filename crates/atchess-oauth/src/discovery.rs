//! Discovery documents: DID documents, protected-resource metadata, and
//! authorization-server metadata

use crate::{OAuthError, OAuthResult};
use serde_json::Value;

/// Where a DID document is served from
pub fn did_document_url(did: &str, plc_directory: &str) -> OAuthResult<String> {
    if let Some(rest) = did.strip_prefix("did:web:") {
        let host = rest.replace("%3A", ":");
        return Ok(format!("https://{host}/.well-known/did.json"));
    }
    if did.starts_with("did:plc:") {
        return Ok(format!("{}/{did}", plc_directory.trim_end_matches('/')));
    }
    Err(OAuthError::Discovery(format!(
        "unsupported DID method in {did}"
    )))
}

/// Pull the PDS endpoint out of a DID document's service list
pub fn pds_endpoint(doc: &Value) -> OAuthResult<String> {
    let services = doc["service"]
        .as_array()
        .ok_or_else(|| OAuthError::Discovery("DID document has no service list".to_string()))?;
    services
        .iter()
        .find(|s| {
            s["id"].as_str().map_or(false, |id| id.ends_with("#atproto_pds"))
                || s["type"].as_str() == Some("AtprotoPersonalDataServer")
        })
        .and_then(|s| s["serviceEndpoint"].as_str())
        .map(|endpoint| endpoint.trim_end_matches('/').to_string())
        .ok_or_else(|| OAuthError::Discovery("no atproto_pds service in DID document".to_string()))
}

/// First authorization server advertised by the resource metadata
pub fn authorization_server(resource_metadata: &Value) -> OAuthResult<String> {
    resource_metadata["authorization_servers"]
        .as_array()
        .and_then(|servers| servers.first())
        .and_then(Value::as_str)
        .map(|s| s.trim_end_matches('/').to_string())
        .ok_or_else(|| {
            OAuthError::Discovery("protected resource lists no authorization servers".to_string())
        })
}

/// Required field of the authorization-server metadata document
pub fn metadata_field(server_metadata: &Value, field: &str) -> OAuthResult<String> {
    server_metadata[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            OAuthError::Discovery(format!("authorization server metadata lacks {field}"))
        })
}

/// Fetch and parse one JSON discovery document
pub async fn fetch_json(http: &reqwest::Client, url: &str) -> OAuthResult<Value> {
    let resp = http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(OAuthError::Discovery(format!(
            "{url} returned {}",
            resp.status()
        )));
    }
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_did_document_urls() {
        assert_eq!(
            did_document_url("did:plc:abc123", "https://plc.directory").unwrap(),
            "https://plc.directory/did:plc:abc123"
        );
        assert_eq!(
            did_document_url("did:web:pds.example.com", "https://plc.directory").unwrap(),
            "https://pds.example.com/.well-known/did.json"
        );
        assert!(did_document_url("did:key:z6Mk", "https://plc.directory").is_err());
    }

    #[test]
    fn test_pds_endpoint_extraction() {
        let doc = json!({
            "id": "did:plc:abc",
            "service": [
                { "id": "#other", "type": "SomethingElse", "serviceEndpoint": "https://x" },
                {
                    "id": "#atproto_pds",
                    "type": "AtprotoPersonalDataServer",
                    "serviceEndpoint": "https://pds.example.com/"
                },
            ],
        });
        assert_eq!(pds_endpoint(&doc).unwrap(), "https://pds.example.com");

        assert!(pds_endpoint(&json!({"service": []})).is_err());
        assert!(pds_endpoint(&json!({})).is_err());
    }

    #[test]
    fn test_authorization_server_selection() {
        let metadata = json!({
            "authorization_servers": ["https://auth.example.com", "https://backup.example.com"],
        });
        assert_eq!(
            authorization_server(&metadata).unwrap(),
            "https://auth.example.com"
        );
        assert!(authorization_server(&json!({"authorization_servers": []})).is_err());
    }

    #[test]
    fn test_metadata_field() {
        let metadata = json!({"token_endpoint": "https://auth.example.com/token"});
        assert_eq!(
            metadata_field(&metadata, "token_endpoint").unwrap(),
            "https://auth.example.com/token"
        );
        assert!(metadata_field(&metadata, "authorization_endpoint").is_err());
    }
}
