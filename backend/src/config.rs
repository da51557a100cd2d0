//! Environment-driven configuration
//!
//! All knobs come from `ATCHESS_*` environment variables (a `.env` file is
//! honored in development). The service account authenticates with handle +
//! password; OAuth logins additionally need the ES256 key, from a file or
//! the `ATCHESS_OAUTH_KEY` variable.

use std::path::PathBuf;

/// Environment variable holding the OAuth signing key PEM when no key file
/// is configured
pub const OAUTH_KEY_ENV: &str = "ATCHESS_OAUTH_KEY";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the PDR host the service account lives on
    pub pdr_url: String,
    pub service_handle: String,
    pub service_password: String,
    /// Path to the ES256 private key PEM for OAuth client auth
    pub oauth_key_path: Option<PathBuf>,
    /// Send DPoP proofs on service-account PDR requests
    pub dpop_enabled: bool,
    /// Public base URL this service is reachable at (client_id base)
    pub public_url: String,
    pub firehose_url: String,
    pub firehose_enabled: bool,
}

impl Config {
    /// Read configuration from the environment
    pub fn from_env() -> Result<Self, String> {
        let pdr_url =
            std::env::var("ATCHESS_PDS_URL").unwrap_or_else(|_| "https://bsky.social".to_string());
        let firehose_url = std::env::var("ATCHESS_FIREHOSE_URL").unwrap_or_else(|_| {
            format!(
                "{}/xrpc/com.atproto.sync.subscribeRepos",
                pdr_url
                    .replacen("https://", "wss://", 1)
                    .replacen("http://", "ws://", 1)
                    .trim_end_matches('/')
            )
        });

        Ok(Self {
            service_handle: require("ATCHESS_HANDLE")?,
            service_password: require("ATCHESS_PASSWORD")?,
            oauth_key_path: std::env::var("ATCHESS_OAUTH_KEY_FILE").ok().map(PathBuf::from),
            dpop_enabled: flag("ATCHESS_DPOP_ENABLED", false),
            public_url: std::env::var("ATCHESS_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            firehose_enabled: flag("ATCHESS_FIREHOSE_ENABLED", true),
            pdr_url,
            firehose_url,
        })
    }
}

fn require(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} must be set"))
}

fn flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        std::env::set_var("ATCHESS_TEST_FLAG", "true");
        assert!(flag("ATCHESS_TEST_FLAG", false));
        std::env::set_var("ATCHESS_TEST_FLAG", "0");
        assert!(!flag("ATCHESS_TEST_FLAG", true));
        std::env::remove_var("ATCHESS_TEST_FLAG");
        assert!(flag("ATCHESS_TEST_FLAG", true));
        assert!(!flag("ATCHESS_TEST_FLAG", false));
    }
}
