//! The login and callback halves of the authorization-code flow

use crate::discovery::{
    authorization_server, did_document_url, fetch_json, metadata_field, pds_endpoint,
};
use crate::store::{OAuthSession, PendingAuth, PendingAuthStore, SessionStore};
use crate::{OAuthError, OAuthResult};
use atchess_crypto::{client_assertion, dpop_proof, generate_pair, random_token, EcdsaKey};
use atchess_pdr::RepoClient;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Static configuration of the OAuth client
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// URL of the served client-metadata document; doubles as client_id
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    /// PLC directory used to fetch `did:plc` documents
    pub plc_directory: String,
}

impl OAuthConfig {
    pub fn new(public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            client_id: format!("{base}/client-metadata.json"),
            redirect_uri: format!("{base}/oauth/callback"),
            scope: "atproto transition:generic".to_string(),
            plc_directory: "https://plc.directory".to_string(),
        }
    }
}

/// What the caller gets back from [`OAuthClient::login`]: send the user to
/// `authorization_url` and wait for the callback
#[derive(Debug, Clone)]
pub struct LoginStart {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    sub: String,
}

/// OAuth flow driver. Holds the service's client-assertion key and both
/// in-process stores.
pub struct OAuthClient {
    http: reqwest::Client,
    key: EcdsaKey,
    config: OAuthConfig,
    resolver: Arc<dyn RepoClient>,
    pub pending: PendingAuthStore,
    pub sessions: SessionStore,
}

impl OAuthClient {
    pub fn new(key: EcdsaKey, config: OAuthConfig, resolver: Arc<dyn RepoClient>) -> OAuthResult<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            key,
            config,
            resolver,
            pending: PendingAuthStore::new(),
            sessions: SessionStore::new(),
        })
    }

    /// Begin a login: discovery, PKCE, per-session DPoP key, pending state,
    /// and the authorization URL to redirect the user to
    pub async fn login(&self, handle: &str) -> OAuthResult<LoginStart> {
        let did = if handle.starts_with("did:") {
            handle.to_string()
        } else {
            self.resolver.resolve_handle(handle).await?
        };

        let did_doc = fetch_json(
            &self.http,
            &did_document_url(&did, &self.config.plc_directory)?,
        )
        .await?;
        let pds_url = pds_endpoint(&did_doc)?;

        let resource = fetch_json(
            &self.http,
            &format!("{pds_url}/.well-known/oauth-protected-resource"),
        )
        .await?;
        let auth_server = authorization_server(&resource)?;

        let server_metadata = fetch_json(
            &self.http,
            &format!("{auth_server}/.well-known/oauth-authorization-server"),
        )
        .await?;
        let authorization_endpoint = metadata_field(&server_metadata, "authorization_endpoint")?;

        let pkce = generate_pair();
        let state = random_token(16);
        let dpop_key = EcdsaKey::generate();

        self.pending.insert(
            &state,
            PendingAuth {
                handle: handle.to_string(),
                did,
                pds_url,
                verifier: pkce.verifier.clone(),
                dpop_key,
                created_at: Utc::now(),
            },
        );

        let authorization_url = build_authorization_url(
            &authorization_endpoint,
            &self.config,
            &state,
            &pkce.challenge,
            handle,
        )?;
        info!("[OAUTH] login started for {}", handle);
        Ok(LoginStart {
            authorization_url,
            state,
        })
    }

    /// Finish a login: redeem the state, exchange the code, mint a session.
    /// Returns the opaque session id.
    pub async fn callback(&self, code: &str, state: &str, iss: &str) -> OAuthResult<String> {
        let pending = self.pending.take(state, Utc::now())?;

        let server_metadata = fetch_json(
            &self.http,
            &format!(
                "{}/.well-known/oauth-authorization-server",
                iss.trim_end_matches('/')
            ),
        )
        .await?;
        let token_endpoint = metadata_field(&server_metadata, "token_endpoint")?;

        let token = self
            .exchange_code(&token_endpoint, code, &pending)
            .await?;

        let session_id = random_token(16);
        self.sessions.insert(
            &session_id,
            OAuthSession {
                did: token.sub.clone(),
                handle: pending.handle.clone(),
                pds_url: pending.pds_url,
                access_token: token.access_token,
                refresh_token: token.refresh_token,
                expires_at: Utc::now() + Duration::seconds(token.expires_in),
                dpop_key: pending.dpop_key,
            },
        );
        info!("[OAUTH] session created for {} ({})", pending.handle, token.sub);
        Ok(session_id)
    }

    /// POST the token request, honoring a single `use_dpop_nonce` bounce
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
        pending: &PendingAuth,
    ) -> OAuthResult<TokenResponse> {
        let assertion = client_assertion(&self.key, &self.config.client_id, token_endpoint)?;
        let form = [
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("code_verifier", pending.verifier.clone()),
            ("client_id", self.config.client_id.clone()),
            (
                "client_assertion_type",
                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_string(),
            ),
            ("client_assertion", assertion),
        ];

        let mut nonce: Option<String> = None;
        for attempt in 0..2 {
            let proof = dpop_proof(
                &pending.dpop_key,
                "POST",
                token_endpoint,
                None,
                nonce.as_deref(),
            )?;
            let resp = self
                .http
                .post(token_endpoint)
                .header("DPoP", proof)
                .form(&form)
                .send()
                .await?;

            if resp.status().is_success() {
                return Ok(resp.json().await?);
            }
            let retry_nonce = resp
                .headers()
                .get("DPoP-Nonce")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body: Value = resp.json().await.unwrap_or_default();
            let code = body["error"].as_str().unwrap_or("").to_string();
            let message = body["error_description"].as_str().unwrap_or("").to_string();

            if attempt == 0 && code == "use_dpop_nonce" {
                if let Some(next) = retry_nonce {
                    debug!("[OAUTH] token endpoint demanded a DPoP nonce; retrying once");
                    nonce = Some(next);
                    continue;
                }
            }
            return Err(OAuthError::Token { code, message });
        }
        unreachable!("token exchange returns within two attempts")
    }

    /// Public half of the client-assertion key, for the metadata document
    pub fn public_jwk(&self) -> &atchess_crypto::PublicJwk {
        self.key.public_jwk()
    }

    /// Look up a live session
    pub fn get_session(&self, session_id: &str) -> OAuthResult<OAuthSession> {
        self.sessions.get(session_id, Utc::now())
    }

    /// Drop a session; idempotent
    pub fn logout(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id)
    }
}

/// Assemble the authorization redirect URL
fn build_authorization_url(
    endpoint: &str,
    config: &OAuthConfig,
    state: &str,
    challenge: &str,
    login_hint: &str,
) -> OAuthResult<String> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| OAuthError::Discovery(format!("bad authorization endpoint: {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("state", state)
        .append_pair("scope", &config.scope)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("login_hint", login_hint);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_parameters() {
        let config = OAuthConfig::new("https://chess.example.com");
        let url = build_authorization_url(
            "https://auth.example.com/oauth/authorize",
            &config,
            "state123",
            "challenge456",
            "alice.example.com",
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(
            pairs["client_id"],
            "https://chess.example.com/client-metadata.json"
        );
        assert_eq!(
            pairs["redirect_uri"],
            "https://chess.example.com/oauth/callback"
        );
        assert_eq!(pairs["state"], "state123");
        assert_eq!(pairs["scope"], "atproto transition:generic");
        assert_eq!(pairs["code_challenge"], "challenge456");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["login_hint"], "alice.example.com");
    }

    #[test]
    fn test_config_derives_urls_from_base() {
        let config = OAuthConfig::new("https://chess.example.com/");
        assert_eq!(
            config.client_id,
            "https://chess.example.com/client-metadata.json"
        );
        assert_eq!(
            config.redirect_uri,
            "https://chess.example.com/oauth/callback"
        );
    }
}
