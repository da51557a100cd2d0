//! Chess rules adapter
//!
//! Wraps a legally-complete move generator behind the [`RulesEngine`] trait
//! so the rest of the system treats chess itself as a black box: feed in a
//! FEN and a from/to pair, get back the resulting FEN, SAN, and end-of-game
//! flags. Identical inputs always produce identical outputs.

mod shakmaty_rules;

pub use shakmaty_rules::ShakmatyRules;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard starting position
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Errors produced by rules validation
#[derive(Error, Debug)]
pub enum RulesError {
    /// Board description failed to parse or is inconsistent
    #[error("Invalid position: {reason}")]
    InvalidPosition { reason: String },

    /// Move is not legal in the given position
    #[error("Illegal move {from}{to}: {reason}")]
    IllegalMove {
        from: String,
        to: String,
        reason: String,
    },
}

/// Result type alias for rules operations
pub type RulesResult<T> = Result<T, RulesError>;

/// Side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Read the side to move from a FEN's turn field
    pub fn from_fen(fen: &str) -> RulesResult<Side> {
        match fen.split_whitespace().nth(1) {
            Some("w") => Ok(Side::White),
            Some("b") => Ok(Side::Black),
            _ => Err(RulesError::InvalidPosition {
                reason: format!("missing or invalid turn field in {fen:?}"),
            }),
        }
    }
}

/// Everything the caller learns from applying one move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Position after the move
    pub fen: String,
    /// SAN with check/mate suffix, e.g. `Qh4#`
    pub san: String,
    pub check: bool,
    pub checkmate: bool,
    /// Stalemate, insufficient material, repetition, or the 50-move clock
    pub draw: bool,
    pub game_over: bool,
    /// `1-0`, `0-1`, or `1/2-1/2` once the game is over
    pub result: Option<String>,
}

/// Pluggable move validator. Implementations must be deterministic.
pub trait RulesEngine: Send + Sync {
    /// Check that the move is legal without applying it
    fn validate(&self, fen: &str, from: &str, to: &str, promotion: Option<char>)
        -> RulesResult<()>;

    /// Apply the move, producing the new position and end-of-game flags
    fn apply(
        &self,
        fen: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> RulesResult<MoveOutcome>;
}

/// Position identity for repetition counting: piece placement, turn,
/// castling rights, and en-passant square. Clocks excluded.
pub fn repetition_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_from_fen() {
        assert_eq!(Side::from_fen(INITIAL_FEN).unwrap(), Side::White);
        assert_eq!(
            Side::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap(),
            Side::Black
        );
        assert!(Side::from_fen("").is_err());
        assert!(Side::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
    }

    #[test]
    fn test_repetition_key_ignores_clocks() {
        let a = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let b = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 40 77";
        assert_eq!(repetition_key(a), repetition_key(b));
        let c = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1";
        assert_ne!(repetition_key(a), repetition_key(c));
    }
}
