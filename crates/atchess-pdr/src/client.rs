//! HTTP implementation of [`RepoClient`]
//!
//! One client wraps one authenticated session against one host. The auth
//! scheme is fixed at construction: `Bearer` sends the token bare, `Dpop`
//! additionally attaches a fresh proof to every request and performs the
//! single `use_dpop_nonce` retry the protocol allows.

use crate::error::{PdrError, PdrResult};
use crate::types::{AuthScheme, FetchedRecord, PdrSession, RecordRef};
use crate::RepoClient;
use async_trait::async_trait;
use atchess_crypto::{dpop_proof, EcdsaKey};
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Hard timeout on every request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Authenticated client for one PDR host
pub struct PdrClient {
    http: reqwest::Client,
    base: String,
    scheme: AuthScheme,
    access_token: String,
    did: String,
    handle: String,
    dpop_key: Option<EcdsaKey>,
}

impl PdrClient {
    /// Establish a session by handle + password and wrap it
    pub async fn login(
        base: &str,
        identifier: &str,
        password: &str,
        scheme: AuthScheme,
    ) -> PdrResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base = base.trim_end_matches('/').to_string();

        let url = format!("{base}/xrpc/com.atproto.server.createSession");
        let resp = http
            .post(&url)
            .json(&json!({ "identifier": identifier, "password": password }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body: Value = resp.json().await.unwrap_or_default();
            return Err(PdrError::from_response(
                status,
                body["error"].as_str().unwrap_or(""),
                body["message"].as_str().unwrap_or(""),
            ));
        }
        let session: PdrSession = resp.json().await?;
        info!(
            "[PDR] session established for {} ({})",
            session.handle, session.did
        );

        let dpop_key = matches!(scheme, AuthScheme::Dpop).then(EcdsaKey::generate);
        Ok(Self {
            http,
            base,
            scheme,
            access_token: session.access_jwt,
            did: session.did,
            handle: session.handle,
            dpop_key,
        })
    }

    /// Wrap an already-issued access token (an OAuth session). DPoP-bound
    /// tokens must come with the key they are bound to.
    pub fn with_token(
        base: &str,
        scheme: AuthScheme,
        access_token: &str,
        did: &str,
        handle: &str,
        dpop_key: Option<EcdsaKey>,
    ) -> PdrResult<Self> {
        if matches!(scheme, AuthScheme::Dpop) && dpop_key.is_none() {
            return Err(PdrError::Crypto(atchess_crypto::CryptoError::InvalidKey {
                reason: "DPoP scheme requires the token's bound key".to_string(),
            }));
        }
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base: base.trim_end_matches('/').to_string(),
            scheme,
            access_token: access_token.to_string(),
            did: did.to_string(),
            handle: handle.to_string(),
            dpop_key,
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    fn authorize(
        &self,
        req: RequestBuilder,
        method: &str,
        url: &str,
        nonce: Option<&str>,
    ) -> PdrResult<RequestBuilder> {
        match self.scheme {
            AuthScheme::Bearer => {
                Ok(req.header(AUTHORIZATION, format!("Bearer {}", self.access_token)))
            }
            AuthScheme::Dpop => {
                let key = self.dpop_key.as_ref().ok_or_else(|| {
                    PdrError::Crypto(atchess_crypto::CryptoError::InvalidKey {
                        reason: "DPoP key missing".to_string(),
                    })
                })?;
                let proof = dpop_proof(key, method, url, Some(&self.access_token), nonce)?;
                Ok(req
                    .header(AUTHORIZATION, format!("DPoP {}", self.access_token))
                    .header("DPoP", proof))
            }
        }
    }

    /// Issue one XRPC call, retrying exactly once when the host demands a
    /// DPoP nonce. Any second failure surfaces as-is.
    async fn send(
        &self,
        method: Method,
        nsid: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> PdrResult<Value> {
        let url = format!("{}/xrpc/{nsid}", self.base);
        let mut nonce: Option<String> = None;

        for attempt in 0..2 {
            let mut req = match method {
                Method::Get => self.http.get(&url),
                Method::Post => self.http.post(&url),
            };
            if let Some(query) = query {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            req = self.authorize(req, method.as_str(), &url, nonce.as_deref())?;

            let resp = req.send().await?;
            let status = resp.status().as_u16();
            if (200..300).contains(&status) {
                let text = resp.text().await?;
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                return Ok(serde_json::from_str(&text)?);
            }

            let retry_nonce = resp
                .headers()
                .get("DPoP-Nonce")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body: Value = resp.json().await.unwrap_or_default();
            let code = body["error"].as_str().unwrap_or("").to_string();
            let message = body["message"].as_str().unwrap_or("").to_string();

            if attempt == 0 && code == "use_dpop_nonce" && matches!(self.scheme, AuthScheme::Dpop) {
                if let Some(next) = retry_nonce {
                    debug!("[PDR] {nsid}: retrying once with server DPoP nonce");
                    nonce = Some(next);
                    continue;
                }
            }
            return Err(PdrError::from_response(status, &code, &message));
        }
        unreachable!("send loop always returns within two attempts")
    }
}

#[async_trait]
impl RepoClient for PdrClient {
    fn did(&self) -> &str {
        &self.did
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: Value,
        rkey: Option<&str>,
    ) -> PdrResult<RecordRef> {
        let mut body = json!({
            "repo": repo,
            "collection": collection,
            "record": record,
        });
        if let Some(rkey) = rkey {
            body["rkey"] = json!(rkey);
        }
        let value = self
            .send(Method::Post, "com.atproto.repo.createRecord", None, Some(&body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: Value,
        swap_cid: Option<&str>,
    ) -> PdrResult<RecordRef> {
        let mut body = json!({
            "repo": repo,
            "collection": collection,
            "rkey": rkey,
            "record": record,
        });
        if let Some(swap_cid) = swap_cid {
            body["swapCid"] = json!(swap_cid);
        }
        let value = self
            .send(Method::Post, "com.atproto.repo.putRecord", None, Some(&body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
    ) -> PdrResult<FetchedRecord> {
        let query = [
            ("repo", repo.to_string()),
            ("collection", collection.to_string()),
            ("rkey", rkey.to_string()),
        ];
        let value = self
            .send(Method::Get, "com.atproto.repo.getRecord", Some(&query), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list_records(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
    ) -> PdrResult<Vec<FetchedRecord>> {
        let query = [
            ("repo", repo.to_string()),
            ("collection", collection.to_string()),
            ("limit", limit.to_string()),
        ];
        let value = self
            .send(
                Method::Get,
                "com.atproto.repo.listRecords",
                Some(&query),
                None,
            )
            .await?;
        let records = value["records"].clone();
        Ok(serde_json::from_value(records)?)
    }

    async fn delete_record(&self, repo: &str, collection: &str, rkey: &str) -> PdrResult<()> {
        let body = json!({
            "repo": repo,
            "collection": collection,
            "rkey": rkey,
        });
        self.send(
            Method::Post,
            "com.atproto.repo.deleteRecord",
            None,
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> PdrResult<String> {
        let query = [("handle", handle.to_string())];
        let value = self
            .send(
                Method::Get,
                "com.atproto.identity.resolveHandle",
                Some(&query),
                None,
            )
            .await?;
        value["did"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| PdrError::NotFound {
                message: format!("no DID for handle {handle}"),
            })
    }
}
