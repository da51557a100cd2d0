//! Recording moves
//!
//! A move is two writes: the immutable Move record in the mover's own
//! repository (pinning the game CID it was played against), then — only
//! when the mover owns the Game record — a compare-and-swap update of the
//! game itself. A lost swap race surfaces as `Conflict` untouched; the
//! position has changed and the caller must re-fetch.
//!
//! Validation runs against the canonical position reconstructed from both
//! repositories, not the Game record's FEN alone: the opponent's moves
//! never touch the Game record, so the record is routinely behind by one
//! ply when it is the owner's turn.

use crate::error::{EngineError, EngineResult};
use crate::service::ChessService;
use atchess_pdr::{RecordRef, RepoClient};
use atchess_records::{collections, now_rfc3339, GameRecord, GameStatus, MoveRecord};
use atchess_rules::{MoveOutcome, RulesEngine, Side};
use serde_json::to_value;
use tracing::{debug, info};

/// What happened when a move was recorded
#[derive(Debug, Clone)]
pub struct MoveReport {
    /// The Move record written to the mover's repository
    pub move_ref: RecordRef,
    pub outcome: MoveOutcome,
    /// Game status after the move
    pub status: GameStatus,
    /// Whether the Game record itself was updated (mover owns it)
    pub game_updated: bool,
}

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Validate and record a move in the game at `game_uri`.
    ///
    /// `expected_fen`, when supplied, is the position the caller believes
    /// they are moving from; a mismatch is rejected before anything is
    /// written.
    pub async fn record_move(
        &self,
        game_uri: &str,
        from: &str,
        to: &str,
        promotion: Option<char>,
        expected_fen: Option<&str>,
    ) -> EngineResult<MoveReport> {
        let (uri, cid, game) = self.fetch_game_as_participant(game_uri).await?;
        if game.status != GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }

        let replayed = self.replay_from(&uri, &game).await?;
        if replayed.status != GameStatus::Active {
            return Err(EngineError::GameNotActive);
        }

        let side = Side::from_fen(&replayed.fen)?;
        let mover = match side {
            Side::White => &game.white,
            Side::Black => &game.black,
        };
        if mover != self.client.did() {
            return Err(EngineError::NotYourTurn);
        }
        if let Some(expected) = expected_fen {
            if expected != replayed.fen {
                return Err(EngineError::StalePosition {
                    expected: expected.to_string(),
                });
            }
        }

        let outcome = self.rules.apply(&replayed.fen, from, to, promotion)?;

        let now = now_rfc3339();
        let move_record = MoveRecord {
            record_type: collections::MOVE.to_string(),
            game: self.game_ref(&uri, &cid),
            from: from.to_string(),
            to: to.to_string(),
            san: outcome.san.clone(),
            fen: outcome.fen.clone(),
            check: outcome.check,
            checkmate: outcome.checkmate,
            created_at: now.clone(),
        };
        let move_ref = self
            .client
            .create_record(
                self.client.did(),
                collections::MOVE,
                to_value(&move_record).expect("move record serializes"),
                None,
            )
            .await?;
        debug!("[MOVE] {} played {} in {}", mover, outcome.san, uri);

        let status = derive_status(&outcome, side);
        let mut game_updated = false;
        if self.owns(&uri) {
            let updated = GameRecord {
                fen: outcome.fen.clone(),
                pgn: append_san(&replayed.pgn, &replayed.fen, side, &outcome.san),
                status,
                updated_at: now,
                ..game
            };
            self.client
                .put_record(
                    &uri.did,
                    &uri.collection,
                    &uri.rkey,
                    to_value(&updated).expect("game record serializes"),
                    Some(&cid),
                )
                .await?;
            game_updated = true;
        }

        if status != GameStatus::Active {
            info!("[GAME] {} finished: {:?} ({})", uri, status, outcome.san);
        }
        Ok(MoveReport {
            move_ref,
            outcome,
            status,
            game_updated,
        })
    }

    /// Bring the caller's own Game record up to the canonical state
    /// reconstructed from both repositories. Returns the new ref when a
    /// write happened. Terminal records are never rewritten.
    pub async fn sync_game(&self, game_uri: &str) -> EngineResult<Option<RecordRef>> {
        let uri = atchess_records::AtUri::parse(game_uri)?;
        if !self.owns(&uri) {
            return Err(EngineError::NotOwner);
        }
        let (cid, game) = self.get_game(game_uri).await?;
        if game.status.is_terminal() {
            return Ok(None);
        }
        let replayed = self.replay_from(&uri, &game).await?;
        let status = if replayed.status == GameStatus::Active {
            self.terminal_record_status(&uri, &game)
                .await?
                .unwrap_or(GameStatus::Active)
        } else {
            replayed.status
        };
        if replayed.fen == game.fen && status == game.status {
            return Ok(None);
        }
        let updated = GameRecord {
            fen: replayed.fen,
            pgn: replayed.pgn,
            status,
            updated_at: now_rfc3339(),
            ..game
        };
        let put = self
            .client
            .put_record(
                &uri.did,
                &uri.collection,
                &uri.rkey,
                to_value(&updated).expect("game record serializes"),
                Some(&cid),
            )
            .await?;
        debug!("[GAME] synced {} to replayed state", game_uri);
        Ok(Some(put))
    }
}

/// New game status implied by the move's terminal flags. The mover delivers
/// mate, so a checkmate flag means the side that just moved won.
pub(crate) fn derive_status(outcome: &MoveOutcome, mover: Side) -> GameStatus {
    if outcome.checkmate {
        match mover {
            Side::White => GameStatus::WhiteWon,
            Side::Black => GameStatus::BlackWon,
        }
    } else if outcome.draw {
        GameStatus::Draw
    } else {
        GameStatus::Active
    }
}

/// Append one SAN to PGN movetext, numbering from the pre-move FEN
pub(crate) fn append_san(pgn: &str, pre_fen: &str, mover: Side, san: &str) -> String {
    let fullmove = pre_fen
        .split_whitespace()
        .nth(5)
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(1);
    match (pgn.is_empty(), mover) {
        (true, Side::White) => format!("{fullmove}. {san}"),
        (true, Side::Black) => format!("{fullmove}... {san}"),
        (false, Side::White) => format!("{pgn} {fullmove}. {san}"),
        (false, Side::Black) => format!("{pgn} {san}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_san_numbering() {
        let fen_w1 = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let fen_b1 = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let fen_w2 = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";

        let pgn = append_san("", fen_w1, Side::White, "e4");
        assert_eq!(pgn, "1. e4");
        let pgn = append_san(&pgn, fen_b1, Side::Black, "e5");
        assert_eq!(pgn, "1. e4 e5");
        let pgn = append_san(&pgn, fen_w2, Side::White, "Nf3");
        assert_eq!(pgn, "1. e4 e5 2. Nf3");
    }

    #[test]
    fn test_append_san_black_start() {
        // Replays that begin mid-game still get readable PGN
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        assert_eq!(append_san("", fen, Side::Black, "e5"), "1... e5");
    }

    #[test]
    fn test_derive_status_table() {
        let outcome = |checkmate: bool, draw: bool| MoveOutcome {
            fen: String::new(),
            san: String::new(),
            check: checkmate,
            checkmate,
            draw,
            game_over: checkmate || draw,
            result: None,
        };
        assert_eq!(
            derive_status(&outcome(true, false), Side::White),
            GameStatus::WhiteWon
        );
        assert_eq!(
            derive_status(&outcome(true, false), Side::Black),
            GameStatus::BlackWon
        );
        assert_eq!(
            derive_status(&outcome(false, true), Side::White),
            GameStatus::Draw
        );
        assert_eq!(
            derive_status(&outcome(false, false), Side::Black),
            GameStatus::Active
        );
    }
}
