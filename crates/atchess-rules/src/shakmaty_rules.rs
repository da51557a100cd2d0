//! Rules engine backed by shakmaty

use crate::{MoveOutcome, RulesEngine, RulesError, RulesResult};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Outcome, Position, Role, Square};

/// Stateless [`RulesEngine`] implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct ShakmatyRules;

impl ShakmatyRules {
    pub fn new() -> Self {
        Self
    }

    fn load(&self, fen: &str) -> RulesResult<Chess> {
        let invalid = |reason: String| RulesError::InvalidPosition { reason };

        if fen.trim().is_empty() {
            return Err(invalid("empty position".to_string()));
        }
        if fen.split_whitespace().count() != 6 {
            return Err(invalid(format!("expected 6 FEN fields in {fen:?}")));
        }

        let parsed: Fen = fen
            .parse()
            .map_err(|e| invalid(format!("unparseable FEN {fen:?}: {e}")))?;
        parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("inconsistent position {fen:?}: {e}")))
    }

    fn find_move(
        &self,
        pos: &Chess,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> RulesResult<Move> {
        let illegal = |reason: String| RulesError::IllegalMove {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };

        let from_sq = parse_square(from).ok_or_else(|| illegal("bad origin square".to_string()))?;
        let to_sq =
            parse_square(to).ok_or_else(|| illegal("bad destination square".to_string()))?;
        if from_sq == to_sq {
            return Err(illegal("origin equals destination".to_string()));
        }
        let promo_role = match promotion {
            Some(c) => Some(
                Role::from_char(c.to_ascii_lowercase())
                    .ok_or_else(|| illegal(format!("unknown promotion piece {c:?}")))?,
            ),
            None => None,
        };

        pos.legal_moves()
            .iter()
            .find(|m| match m {
                // Castling is entered as the king's two-square hop
                Move::Castle { king, .. } => {
                    promo_role.is_none()
                        && *king == from_sq
                        && m.castling_side()
                            .map(|side| Square::from_coords(side.king_to_file(), king.rank()))
                            == Some(to_sq)
                }
                _ => m.from() == Some(from_sq) && m.to() == to_sq && m.promotion() == promo_role,
            })
            .cloned()
            .ok_or_else(|| illegal("no legal move between those squares".to_string()))
    }
}

impl RulesEngine for ShakmatyRules {
    fn validate(
        &self,
        fen: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> RulesResult<()> {
        let pos = self.load(fen)?;
        self.find_move(&pos, from, to, promotion).map(|_| ())
    }

    fn apply(
        &self,
        fen: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
    ) -> RulesResult<MoveOutcome> {
        let mut pos = self.load(fen)?;
        let m = self.find_move(&pos, from, to, promotion)?;

        let san = SanPlus::from_move_and_play_unchecked(&mut pos, &m).to_string();
        let new_fen = Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string();

        let outcome = pos.outcome();
        let checkmate = pos.is_checkmate();
        // The 50-move clock draws the game here even though the generator
        // only forces draws at 75
        let draw = matches!(outcome, Some(Outcome::Draw)) || pos.halfmoves() >= 100;
        let game_over = pos.is_game_over() || draw;
        let result = match outcome {
            Some(Outcome::Decisive { winner }) => {
                Some(if winner.is_white() { "1-0" } else { "0-1" }.to_string())
            }
            Some(Outcome::Draw) => Some("1/2-1/2".to_string()),
            None if draw => Some("1/2-1/2".to_string()),
            None => None,
        };

        Ok(MoveOutcome {
            fen: new_fen,
            san,
            check: pos.is_check(),
            checkmate,
            draw,
            game_over,
            result,
        })
    }
}

fn parse_square(input: &str) -> Option<Square> {
    Square::from_ascii(input.to_ascii_lowercase().as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::INITIAL_FEN;

    fn apply_all(rules: &ShakmatyRules, moves: &[(&str, &str)]) -> MoveOutcome {
        let mut fen = INITIAL_FEN.to_string();
        let mut last = None;
        for &(from, to) in moves {
            let outcome = rules.apply(&fen, from, to, None).expect("legal move");
            fen = outcome.fen.clone();
            last = Some(outcome);
        }
        last.expect("at least one move")
    }

    #[test]
    fn test_fools_mate() {
        let rules = ShakmatyRules::new();
        let end = apply_all(
            &rules,
            &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")],
        );
        assert_eq!(end.san, "Qh4#");
        assert!(end.checkmate);
        assert!(end.check);
        assert!(end.game_over);
        assert_eq!(end.result.as_deref(), Some("0-1"));
    }

    #[test]
    fn test_scholars_mate_variant() {
        let rules = ShakmatyRules::new();
        let end = apply_all(
            &rules,
            &[("g2", "g4"), ("e7", "e5"), ("f2", "f4"), ("d8", "h4")],
        );
        assert_eq!(end.san, "Qh4#");
        assert!(end.checkmate);
        assert_eq!(end.result.as_deref(), Some("0-1"));
    }

    #[test]
    fn test_opening_move_produces_expected_fen() {
        let rules = ShakmatyRules::new();
        let outcome = rules.apply(INITIAL_FEN, "e2", "e4", None).unwrap();
        assert_eq!(
            outcome.fen,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(outcome.san, "e4");
        assert!(!outcome.check);
        assert!(!outcome.game_over);
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_illegal_move_rejected() {
        let rules = ShakmatyRules::new();
        let err = rules.apply(INITIAL_FEN, "e2", "e5", None).unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove { .. }));
        assert!(rules.validate(INITIAL_FEN, "e7", "e5", None).is_err());
    }

    #[test]
    fn test_origin_equals_destination_rejected() {
        let rules = ShakmatyRules::new();
        let err = rules.validate(INITIAL_FEN, "e2", "e2", None).unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove { .. }));
    }

    #[test]
    fn test_empty_and_malformed_fen_rejected() {
        let rules = ShakmatyRules::new();
        assert!(matches!(
            rules.apply("", "e2", "e4", None),
            Err(RulesError::InvalidPosition { .. })
        ));
        assert!(matches!(
            rules.apply("rnbqkbnr/pppppppp w KQkq", "e2", "e4", None),
            Err(RulesError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_castling_through_attacked_square_rejected() {
        let rules = ShakmatyRules::new();
        // Black rook on f8 covers f1, so O-O is out
        let fen = "4kr2/8/8/8/8/8/8/4K2R w K - 0 1";
        let err = rules.validate(fen, "e1", "g1", None).unwrap_err();
        assert!(matches!(err, RulesError::IllegalMove { .. }));
    }

    #[test]
    fn test_castling_allowed_when_path_is_safe() {
        let rules = ShakmatyRules::new();
        let fen = "4k3/8/8/8/8/8/8/4K2R w K - 0 1";
        let outcome = rules.apply(fen, "e1", "g1", None).unwrap();
        assert_eq!(outcome.san, "O-O");
    }

    #[test]
    fn test_promotion() {
        let rules = ShakmatyRules::new();
        let fen = "8/P7/8/8/8/4k3/8/4K3 w - - 0 1";
        let outcome = rules.apply(fen, "a7", "a8", Some('q')).unwrap();
        assert_eq!(outcome.san, "a8=Q");
        assert!(outcome.fen.starts_with("Q7/"));
        // Promotion requires naming the piece
        assert!(rules.validate(fen, "a7", "a8", None).is_err());
    }

    #[test]
    fn test_stalemate_is_a_draw() {
        let rules = ShakmatyRules::new();
        // Qg7 stalemates the cornered king
        let fen = "7k/8/6K1/8/8/8/5Q2/8 w - - 0 1";
        let outcome = rules.apply(fen, "f2", "f7", None).unwrap();
        assert!(outcome.draw);
        assert!(outcome.game_over);
        assert!(!outcome.checkmate);
        assert_eq!(outcome.result.as_deref(), Some("1/2-1/2"));
    }

    #[test]
    fn test_fifty_move_clock_draws() {
        let rules = ShakmatyRules::new();
        let fen = "8/8/8/8/8/4k3/8/R3K3 w Q - 99 80";
        let outcome = rules.apply(fen, "a1", "a2", None).unwrap();
        assert!(outcome.draw);
        assert!(outcome.game_over);
        assert_eq!(outcome.result.as_deref(), Some("1/2-1/2"));
    }

    #[test]
    fn test_insufficient_material_draws() {
        let rules = ShakmatyRules::new();
        // Kxf1 leaves bare kings
        let fen = "8/8/8/8/8/4k3/8/4Kn2 w - - 0 1";
        let outcome = rules.apply(fen, "e1", "f1", None).unwrap();
        assert!(outcome.draw);
        assert!(outcome.game_over);
    }

    #[test]
    fn test_determinism() {
        let rules = ShakmatyRules::new();
        let a = rules.apply(INITIAL_FEN, "g1", "f3", None).unwrap();
        let b = rules.apply(INITIAL_FEN, "g1", "f3", None).unwrap();
        assert_eq!(a, b);
    }
}
