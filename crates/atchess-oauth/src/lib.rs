//! OAuth login for repository write access
//!
//! Authorization-code + PKCE + DPoP + `private_key_jwt`, the flow that lets
//! a user delegate writes to their repository without ever giving this
//! service a password. Discovery walks handle → DID → DID document → PDS →
//! protected-resource metadata → authorization server.

pub mod client;
pub mod discovery;
pub mod metadata;
pub mod store;

pub use client::{LoginStart, OAuthClient, OAuthConfig};
pub use metadata::client_metadata;
pub use store::{OAuthSession, PendingAuth, PendingAuthStore, SessionStore};

use thiserror::Error;

/// Errors from login, callback, and session handling
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Callback state unknown, already used, or older than the window
    #[error("Invalid or expired authorization state")]
    InvalidState,

    /// Session token past its expiry; the user must log in again
    #[error("Session expired")]
    Expired,

    /// No session under that id
    #[error("Unknown session")]
    UnknownSession,

    /// A discovery document was missing or malformed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Token endpoint refused the exchange
    #[error("Token request rejected: {code}: {message}")]
    Token { code: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Crypto(#[from] atchess_crypto::CryptoError),

    /// Handle resolution failure
    #[error(transparent)]
    Pdr(#[from] atchess_pdr::PdrError),
}

/// Result type alias for OAuth operations
pub type OAuthResult<T> = Result<T, OAuthError>;
