//! Error taxonomy for PDR operations

use thiserror::Error;

/// Errors surfaced by repository operations
#[derive(Error, Debug)]
pub enum PdrError {
    /// Transport-level failure (DNS, TLS, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Credentials missing, expired, or rejected
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Authenticated but not allowed to touch this repository
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Record or repository does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// CID swap mismatch or duplicate rkey
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Request the host rejected outright
    #[error("Bad request {code}: {message}")]
    BadRequest { code: String, message: String },

    /// Anything 5xx or otherwise unexpected
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// Proof or assertion construction failed
    #[error("Crypto error: {0}")]
    Crypto(#[from] atchess_crypto::CryptoError),
}

impl PdrError {
    /// True when retrying the identical request can't succeed
    pub fn is_permanent(&self) -> bool {
        !matches!(self, PdrError::Network(_) | PdrError::Server { .. })
    }

    /// Map an XRPC error response to the taxonomy
    pub fn from_response(status: u16, code: &str, message: &str) -> Self {
        let message = if message.is_empty() {
            code.to_string()
        } else {
            message.to_string()
        };
        match status {
            401 => PdrError::Unauthorized { message },
            403 => PdrError::Forbidden { message },
            404 => PdrError::NotFound { message },
            409 => PdrError::Conflict { message },
            400 if code == "InvalidSwap" || code == "RecordAlreadyExists" => {
                PdrError::Conflict { message }
            }
            400..=499 => PdrError::BadRequest {
                code: code.to_string(),
                message,
            },
            _ => PdrError::Server { status, message },
        }
    }
}

/// Result type alias for PDR operations
pub type PdrResult<T> = Result<T, PdrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            PdrError::from_response(401, "AuthRequired", ""),
            PdrError::Unauthorized { .. }
        ));
        assert!(matches!(
            PdrError::from_response(403, "Forbidden", "nope"),
            PdrError::Forbidden { .. }
        ));
        assert!(matches!(
            PdrError::from_response(404, "RecordNotFound", ""),
            PdrError::NotFound { .. }
        ));
        assert!(matches!(
            PdrError::from_response(409, "InvalidSwap", ""),
            PdrError::Conflict { .. }
        ));
        assert!(matches!(
            PdrError::from_response(500, "Internal", ""),
            PdrError::Server { status: 500, .. }
        ));
    }

    #[test]
    fn test_swap_failures_are_conflicts_even_as_400() {
        assert!(matches!(
            PdrError::from_response(400, "InvalidSwap", "cid mismatch"),
            PdrError::Conflict { .. }
        ));
        assert!(matches!(
            PdrError::from_response(400, "RecordAlreadyExists", ""),
            PdrError::Conflict { .. }
        ));
        assert!(matches!(
            PdrError::from_response(400, "InvalidRequest", ""),
            PdrError::BadRequest { .. }
        ));
    }

    #[test]
    fn test_permanence() {
        assert!(PdrError::Conflict {
            message: String::new()
        }
        .is_permanent());
        assert!(!PdrError::Server {
            status: 503,
            message: String::new()
        }
        .is_permanent());
    }
}
