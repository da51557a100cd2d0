//! PKCE verifier/challenge pairs (S256)

use crate::b64url;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A fresh PKCE pair; the verifier stays with the pending authorization,
/// the challenge goes into the authorization URL
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// 32 random bytes of verifier and its S256 challenge
pub fn generate_pair() -> PkcePair {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = b64url(&bytes);
    let challenge = b64url(&Sha256::digest(verifier.as_bytes()));
    PkcePair {
        verifier,
        challenge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_is_s256_of_verifier() {
        let pair = generate_pair();
        assert_eq!(pair.verifier.len(), 43); // 32 bytes base64url
        assert_eq!(
            pair.challenge,
            b64url(&Sha256::digest(pair.verifier.as_bytes()))
        );
    }

    #[test]
    fn test_pairs_are_unique() {
        let a = generate_pair();
        let b = generate_pair();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }
}
