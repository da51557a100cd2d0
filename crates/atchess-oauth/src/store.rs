//! Pending-authorization and session stores
//!
//! Both are plain in-process maps behind locks. Pending authorizations die
//! after 15 minutes whether or not the callback ever arrives; sessions die
//! at their token's expiry. Eviction is lazy on read plus a periodic sweep
//! the host process drives.

use crate::{OAuthError, OAuthResult};
use atchess_crypto::EcdsaKey;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Authorization requests expire after this long
pub const PENDING_TTL_MINUTES: i64 = 15;

/// State parked between building the authorization URL and the callback
#[derive(Clone)]
pub struct PendingAuth {
    pub handle: String,
    pub did: String,
    pub pds_url: String,
    pub verifier: String,
    /// Per-session DPoP key the token will be bound to
    pub dpop_key: EcdsaKey,
    pub created_at: DateTime<Utc>,
}

/// state → pending authorization, single lock
#[derive(Clone, Default)]
pub struct PendingAuthStore {
    inner: Arc<Mutex<HashMap<String, PendingAuth>>>,
}

impl PendingAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: &str, pending: PendingAuth) {
        self.inner.lock().insert(state.to_string(), pending);
    }

    /// Retrieve-and-delete; a state can be redeemed once, within the window
    pub fn take(&self, state: &str, now: DateTime<Utc>) -> OAuthResult<PendingAuth> {
        let pending = self
            .inner
            .lock()
            .remove(state)
            .ok_or(OAuthError::InvalidState)?;
        if now - pending.created_at > Duration::minutes(PENDING_TTL_MINUTES) {
            return Err(OAuthError::InvalidState);
        }
        Ok(pending)
    }

    /// Drop everything past the window; returns how many died
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.lock();
        let before = map.len();
        map.retain(|_, p| now - p.created_at <= Duration::minutes(PENDING_TTL_MINUTES));
        before - map.len()
    }
}

/// A logged-in user: DPoP-bound token plus the key it is bound to
#[derive(Clone)]
pub struct OAuthSession {
    pub did: String,
    pub handle: String,
    pub pds_url: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub dpop_key: EcdsaKey,
}

/// session-id → session, read-mostly
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, OAuthSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, session: OAuthSession) {
        self.inner.write().insert(session_id.to_string(), session);
    }

    /// Read a live session. Expired sessions are evicted on the spot and
    /// surface as `Expired`.
    pub fn get(&self, session_id: &str, now: DateTime<Utc>) -> OAuthResult<OAuthSession> {
        {
            let sessions = self.inner.read();
            match sessions.get(session_id) {
                None => return Err(OAuthError::UnknownSession),
                Some(session) if now <= session.expires_at => return Ok(session.clone()),
                Some(_) => {}
            }
        }
        self.inner.write().remove(session_id);
        Err(OAuthError::Expired)
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.inner.write().remove(session_id).is_some()
    }

    /// Periodic sweep; the host process calls this every 15 minutes
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, s| now <= s.expires_at);
        let evicted = before - map.len();
        if evicted > 0 {
            debug!("[OAUTH] evicted {} expired sessions", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
