//! Deterministic record key generation
//!
//! A challenge names the game record it proposes before that game exists.
//! Both players derive the same rkey from the same inputs, so whoever
//! accepts, the resulting game converges on one identity.

use sha2::{Digest, Sha256};

/// RFC 4648 base32 alphabet, lowercased; rkeys are case-sensitive and hosts
/// normalize to lowercase
const BASE32_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Maximum rkey length produced here, prefix included
const RKEY_LEN: usize = 11;

/// Derive the proposed game rkey for a challenge:
/// `"ch" + lowercase-base32(sha256(challenger ":" challenged ":" secs)[..8])`
/// truncated to 11 characters.
pub fn proposed_game_rkey(challenger: &str, challenged: &str, unix_seconds: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenger.as_bytes());
    hasher.update(b":");
    hasher.update(challenged.as_bytes());
    hasher.update(b":");
    hasher.update(unix_seconds.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut rkey = String::from("ch");
    rkey.push_str(&base32_lower(&digest[..8]));
    rkey.truncate(RKEY_LEN);
    rkey
}

/// Unpadded lowercase base32 over 5-bit groups, most significant bits first
fn base32_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &b in bytes {
        buffer = (buffer << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1f) as usize;
            out.push(BASE32_ALPHABET[index] as char);
        }
    }
    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(BASE32_ALPHABET[index] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rkey_is_deterministic() {
        let a = proposed_game_rkey("did:plc:alice", "did:plc:bob", 1_750_000_000);
        let b = proposed_game_rkey("did:plc:alice", "did:plc:bob", 1_750_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rkey_shape() {
        let rkey = proposed_game_rkey("did:plc:alice", "did:plc:bob", 1_750_000_000);
        assert_eq!(rkey.len(), 11);
        assert!(rkey.starts_with("ch"));
        for c in rkey.chars().skip(2) {
            assert!(
                c.is_ascii_lowercase() || ('2'..='7').contains(&c),
                "unexpected rkey character {c}"
            );
        }
    }

    #[test]
    fn test_rkey_varies_with_inputs() {
        let base = proposed_game_rkey("did:plc:alice", "did:plc:bob", 1_750_000_000);
        assert_ne!(
            base,
            proposed_game_rkey("did:plc:alice", "did:plc:bob", 1_750_000_001)
        );
        assert_ne!(
            base,
            proposed_game_rkey("did:plc:bob", "did:plc:alice", 1_750_000_000)
        );
    }

    #[test]
    fn test_base32_known_vector() {
        // RFC 4648: "foobar" -> MZXW6YTBOI, lowercased and unpadded here
        assert_eq!(base32_lower(b"foobar"), "mzxw6ytboi");
        assert_eq!(base32_lower(b""), "");
    }
}
