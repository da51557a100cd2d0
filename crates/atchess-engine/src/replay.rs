//! Canonical game reconstruction
//!
//! The true move log is the union of Move records across both players'
//! repositories, ordered by createdAt and revalidated from the initial
//! position. Moves that are illegal against the reconstructed position
//! (e.g. the loser of a concurrent-update race) are skipped, not fatal.
//! Threefold repetition is detected here, across the replayed line.

use crate::error::EngineResult;
use crate::service::{ChessService, LIST_LIMIT};
use atchess_pdr::RepoClient;
use atchess_records::{collections, AtUri, DrawOfferRecord, DrawOfferStatus, GameRecord,
    GameStatus, MoveRecord, ResignationRecord, TimeViolationRecord};
use atchess_rules::{repetition_key, RulesEngine, Side, INITIAL_FEN};
use std::collections::HashMap;
use tracing::warn;

/// One accepted move in the reconstructed log
#[derive(Debug, Clone)]
pub struct ReplayedMove {
    /// DID of the mover
    pub by: String,
    pub san: String,
    /// Position after the move
    pub fen: String,
    pub created_at: String,
}

/// A game as observers see it: moves merged, revalidated, and reduced to a
/// position and status
#[derive(Debug, Clone)]
pub struct ReplayedGame {
    pub fen: String,
    pub pgn: String,
    pub status: GameStatus,
    pub moves: Vec<ReplayedMove>,
    /// Move records that did not validate against the reconstructed line
    pub skipped: usize,
}

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Rebuild the canonical log of `game_uri` from both repositories
    pub async fn replay_game(&self, game_uri: &str) -> EngineResult<ReplayedGame> {
        let uri = AtUri::parse(game_uri)?;
        let (_, game) = self.get_game(game_uri).await?;
        self.replay_from(&uri, &game).await
    }

    /// Replay against an already-fetched game record
    pub(crate) async fn replay_from(
        &self,
        uri: &AtUri,
        game: &GameRecord,
    ) -> EngineResult<ReplayedGame> {
        let mut records = self.collect_moves(uri, game).await?;
        // createdAt is the only cross-repo order there is; CID breaks ties
        records.sort_by(|a, b| {
            (a.2.created_at.as_str(), a.0.as_str()).cmp(&(b.2.created_at.as_str(), b.0.as_str()))
        });

        let mut fen = INITIAL_FEN.to_string();
        let mut pgn = String::new();
        let mut moves = Vec::new();
        let mut skipped = 0;
        let mut status = GameStatus::Active;
        let mut seen_positions: HashMap<String, u32> = HashMap::new();
        seen_positions.insert(repetition_key(&fen), 1);

        for (_, repo, record) in records {
            if status != GameStatus::Active {
                skipped += 1;
                continue;
            }
            let Ok(side) = Side::from_fen(&fen) else {
                break;
            };
            let expected_mover = match side {
                Side::White => &game.white,
                Side::Black => &game.black,
            };
            // A move only counts when it came out of the on-move player's
            // own repository
            if &repo != expected_mover {
                warn!(
                    "[REPLAY] skipping out-of-turn move {}{} from {} in {}",
                    record.from, record.to, repo, uri
                );
                skipped += 1;
                continue;
            }

            let promotion = promotion_from_san(&record.san);
            let outcome = match self.rules.apply(&fen, &record.from, &record.to, promotion) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        "[REPLAY] skipping invalid move {}{} in {}: {}",
                        record.from, record.to, uri, e
                    );
                    skipped += 1;
                    continue;
                }
            };

            pgn = crate::moves::append_san(&pgn, &fen, side, &outcome.san);
            fen = outcome.fen.clone();
            moves.push(ReplayedMove {
                by: expected_mover.clone(),
                san: outcome.san,
                fen: outcome.fen,
                created_at: record.created_at,
            });

            let repeats = seen_positions
                .entry(repetition_key(&fen))
                .and_modify(|n| *n += 1)
                .or_insert(1);
            if outcome.checkmate {
                status = match side {
                    Side::White => GameStatus::WhiteWon,
                    Side::Black => GameStatus::BlackWon,
                };
            } else if outcome.draw || *repeats >= 3 {
                status = GameStatus::Draw;
            }
        }

        Ok(ReplayedGame {
            fen,
            pgn,
            status,
            moves,
            skipped,
        })
    }

    /// Full derived status: the replayed log, then resignations, accepted
    /// draw offers, and adjudicated time violations from either repository.
    /// This is what `status=active` means in the large: none of those
    /// terminal events exist anywhere.
    pub async fn derive_status(&self, game_uri: &str) -> EngineResult<GameStatus> {
        let uri = AtUri::parse(game_uri)?;
        let (_, game) = self.get_game(game_uri).await?;
        let replayed = self.replay_from(&uri, &game).await?;
        if replayed.status != GameStatus::Active {
            return Ok(replayed.status);
        }
        Ok(self
            .terminal_record_status(&uri, &game)
            .await?
            .unwrap_or(GameStatus::Active))
    }

    /// Terminal status implied by resignation, accepted draw offer, or
    /// adjudicated time-violation records, if any exist in either repo
    pub(crate) async fn terminal_record_status(
        &self,
        uri: &AtUri,
        game: &GameRecord,
    ) -> EngineResult<Option<GameStatus>> {
        let uri_string = uri.to_string();

        for repo in [&game.white, &game.black] {
            for record in self
                .client
                .list_records(repo, collections::RESIGNATION, LIST_LIMIT)
                .await?
            {
                let Ok(resignation) = serde_json::from_value::<ResignationRecord>(record.value)
                else {
                    continue;
                };
                if resignation.game.uri == uri_string {
                    return Ok(Some(if resignation.resigning_player == game.white {
                        GameStatus::BlackWon
                    } else {
                        GameStatus::WhiteWon
                    }));
                }
            }

            for record in self
                .client
                .list_records(repo, collections::DRAW_OFFER, LIST_LIMIT)
                .await?
            {
                let Ok(offer) = serde_json::from_value::<DrawOfferRecord>(record.value) else {
                    continue;
                };
                if offer.game.uri == uri_string && offer.status == DrawOfferStatus::Accepted {
                    return Ok(Some(GameStatus::Draw));
                }
            }

            for record in self
                .client
                .list_records(repo, collections::TIME_VIOLATION, LIST_LIMIT)
                .await?
            {
                let Ok(violation) = serde_json::from_value::<TimeViolationRecord>(record.value)
                else {
                    continue;
                };
                if violation.game.uri == uri_string {
                    return Ok(Some(if violation.violating_player == game.white {
                        GameStatus::BlackWon
                    } else {
                        GameStatus::WhiteWon
                    }));
                }
            }
        }
        Ok(None)
    }

    async fn collect_moves(
        &self,
        uri: &AtUri,
        game: &GameRecord,
    ) -> EngineResult<Vec<(String, String, MoveRecord)>> {
        let uri_string = uri.to_string();
        let mut out = Vec::new();
        for repo in [&game.white, &game.black] {
            let records = self
                .client
                .list_records(repo, collections::MOVE, LIST_LIMIT)
                .await?;
            for record in records {
                let Ok(mv) = serde_json::from_value::<MoveRecord>(record.value) else {
                    continue;
                };
                if mv.game.uri == uri_string {
                    out.push((record.cid, repo.clone(), mv));
                }
            }
        }
        Ok(out)
    }
}

/// Recover the promoted piece from SAN (`a8=Q` → `q`); Move records carry
/// no separate promotion field
fn promotion_from_san(san: &str) -> Option<char> {
    let idx = san.find('=')?;
    san[idx + 1..].chars().next().map(|c| c.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_from_san() {
        assert_eq!(promotion_from_san("a8=Q"), Some('q'));
        assert_eq!(promotion_from_san("exd8=N+"), Some('n'));
        assert_eq!(promotion_from_san("Qh4#"), None);
        assert_eq!(promotion_from_san("O-O"), None);
    }
}
