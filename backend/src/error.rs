//! Error surface for the command layer
//!
//! One wrapper over the component errors, plus the HTTP-ish status each
//! maps to so a transport layer can translate mechanically.

use atchess_engine::EngineError;
use atchess_oauth::OAuthError;
use atchess_pdr::PdrError;
use thiserror::Error;

/// Anything a command can fail with
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),

    #[error(transparent)]
    Pdr(#[from] PdrError),

    /// OAuth subsystem not configured (no signing key)
    #[error("OAuth is not configured")]
    OAuthUnavailable,
}

/// Result type alias for command handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status code a transport should surface this as
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Engine(e) => engine_status(e),
            ApiError::OAuth(e) => oauth_status(e),
            ApiError::Pdr(e) => pdr_status(e),
            ApiError::OAuthUnavailable => 503,
        }
    }
}

fn engine_status(e: &EngineError) -> u16 {
    match e {
        EngineError::InvalidInput(_)
        | EngineError::Record(_)
        | EngineError::Rules(_)
        | EngineError::GameNotActive
        | EngineError::DrawOfferPending
        | EngineError::OfferNotPending
        | EngineError::OwnOffer
        | EngineError::ChallengeExpired(_)
        | EngineError::NoViolation(_)
        | EngineError::NoTimeControl
        | EngineError::StalePosition { .. } => 400,
        EngineError::NotParticipant | EngineError::NotYourTurn | EngineError::NotOwner => 403,
        EngineError::Pdr(e) => pdr_status(e),
    }
}

fn oauth_status(e: &OAuthError) -> u16 {
    match e {
        OAuthError::InvalidState | OAuthError::Token { .. } => 400,
        OAuthError::Expired | OAuthError::UnknownSession => 401,
        OAuthError::Discovery(_) => 502,
        OAuthError::Network(_) => 502,
        OAuthError::Crypto(_) => 500,
        OAuthError::Pdr(e) => pdr_status(e),
    }
}

fn pdr_status(e: &PdrError) -> u16 {
    match e {
        PdrError::Unauthorized { .. } => 401,
        PdrError::Forbidden { .. } => 403,
        PdrError::NotFound { .. } => 404,
        PdrError::Conflict { .. } => 409,
        PdrError::BadRequest { .. } => 400,
        PdrError::Network(_) => 502,
        PdrError::Server { .. } | PdrError::Decode(_) | PdrError::Crypto(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(EngineError::NotYourTurn).status_code(),
            403
        );
        assert_eq!(
            ApiError::from(EngineError::Pdr(PdrError::Conflict {
                message: String::new()
            }))
            .status_code(),
            409
        );
        assert_eq!(ApiError::from(OAuthError::Expired).status_code(), 401);
        assert_eq!(
            ApiError::from(EngineError::NoViolation("early".to_string())).status_code(),
            400
        );
    }
}
