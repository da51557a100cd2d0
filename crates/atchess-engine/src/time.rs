//! Correspondence time control
//!
//! Deadlines are derived, never stored: the most recent Move record from
//! either repository (or the game's creation time) plus the game's
//! days-per-move allowance. Claims re-derive at adjudication time and the
//! comparison is strictly greater-than; a claim exactly at the deadline
//! fails.

use crate::error::{EngineError, EngineResult};
use crate::service::ChessService;
use atchess_pdr::{RecordRef, RepoClient};
use atchess_records::{
    collections, parse_rfc3339, to_rfc3339, AtUri, GameRecord, GameStatus, TimeControl,
    TimeViolationRecord,
};
use atchess_rules::{RulesEngine, Side};
use chrono::{DateTime, Duration, Utc};
use serde_json::to_value;
use tracing::{info, warn};

/// A game is abandoned after three full time controls of silence
const ABANDONMENT_FACTOR: i64 = 3;

/// Clock state of one game at a given instant
#[derive(Debug, Clone)]
pub struct TimeStatus {
    pub time_control: TimeControl,
    /// Whose clock is running
    pub side_to_move: Side,
    /// DID of the player on move
    pub player_to_move: String,
    pub last_move_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Seconds until the deadline, clamped at zero
    pub remaining_seconds: i64,
    /// Deadline strictly passed while the game is still active
    pub violated: bool,
    /// Three time controls elapsed with no move from either side
    pub abandoned: bool,
}

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Derive the clock state of `game_uri` at `now`
    pub async fn time_status(&self, game_uri: &str, now: DateTime<Utc>) -> EngineResult<TimeStatus> {
        let uri = AtUri::parse(game_uri)?;
        let (_, game) = self.get_game(game_uri).await?;
        self.time_status_of(&uri, &game, now).await
    }

    /// `(violated, status)` without writing anything
    pub async fn check_violation(
        &self,
        game_uri: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<(bool, TimeStatus)> {
        let status = self.time_status(game_uri, now).await?;
        Ok((status.violated, status))
    }

    /// Remaining thinking time, clamped at zero once the flag falls
    pub async fn time_remaining(&self, game_uri: &str) -> EngineResult<TimeStatus> {
        self.time_status(game_uri, Utc::now()).await
    }

    /// Adjudicate a time forfeit: re-derive the violation, write the
    /// TimeViolation record, and (when the claimant owns the game) flip the
    /// game to a win for the non-violating side.
    pub async fn claim_time_victory(
        &self,
        game_uri: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<(RecordRef, TimeViolationRecord)> {
        let (uri, cid, game) = self.fetch_game_as_participant(game_uri).await?;
        let status = self.time_status_of(&uri, &game, now).await?;
        if !status.violated {
            return Err(EngineError::NoViolation(format!(
                "deadline {} has not passed",
                to_rfc3339(status.deadline)
            )));
        }

        let winner = match status.side_to_move {
            Side::White => GameStatus::BlackWon,
            Side::Black => GameStatus::WhiteWon,
        };
        self.write_violation(&uri, &cid, game, status, winner, now)
            .await
    }

    /// Whether the game qualifies for an abandonment claim
    pub async fn check_abandonment(
        &self,
        game_uri: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<(bool, TimeStatus)> {
        let status = self.time_status(game_uri, now).await?;
        Ok((status.abandoned, status))
    }

    /// Adjudicate abandonment. Same record-writing behavior as a time
    /// claim, but the game ends `abandoned` rather than won.
    pub async fn claim_abandoned(
        &self,
        game_uri: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<(RecordRef, TimeViolationRecord)> {
        let (uri, cid, game) = self.fetch_game_as_participant(game_uri).await?;
        let status = self.time_status_of(&uri, &game, now).await?;
        if !status.abandoned {
            return Err(EngineError::NoViolation(format!(
                "abandonment threshold {} has not passed",
                to_rfc3339(status.last_move_at + status.allowance() * ABANDONMENT_FACTOR as i32)
            )));
        }
        self.write_violation(&uri, &cid, game, status, GameStatus::Abandoned, now)
            .await
    }

    /// Check every URI in `game_uris`, returning those in violation.
    /// Individual failures are logged and skipped so one bad game does not
    /// stall the scan.
    pub async fn scan_for_violations(
        &self,
        game_uris: &[String],
        now: DateTime<Utc>,
    ) -> Vec<(String, TimeStatus)> {
        let mut violations = Vec::new();
        for game_uri in game_uris {
            match self.time_status(game_uri, now).await {
                Ok(status) if status.violated => {
                    violations.push((game_uri.clone(), status));
                }
                Ok(_) => {}
                Err(EngineError::NoTimeControl) => {}
                Err(e) => warn!("[CLOCK] scan of {} failed: {}", game_uri, e),
            }
        }
        violations
    }

    async fn write_violation(
        &self,
        uri: &AtUri,
        cid: &str,
        game: GameRecord,
        status: TimeStatus,
        outcome: GameStatus,
        now: DateTime<Utc>,
    ) -> EngineResult<(RecordRef, TimeViolationRecord)> {
        let caller = self.client.did().to_string();
        let violation = TimeViolationRecord {
            record_type: collections::TIME_VIOLATION.to_string(),
            game: self.game_ref(uri, cid),
            claiming_player: caller.clone(),
            violating_player: status.player_to_move.clone(),
            last_move_at: to_rfc3339(status.last_move_at),
            time_control: status.time_control.clone(),
            created_at: to_rfc3339(now),
        };
        let created = self
            .client
            .create_record(
                &caller,
                collections::TIME_VIOLATION,
                to_value(&violation).expect("violation serializes"),
                None,
            )
            .await?;

        if self.owns(uri) {
            self.finish_game(uri, cid, game, outcome).await?;
        }
        info!(
            "[CLOCK] {} adjudicated {:?} against {} in {} (idle since {})",
            caller,
            outcome,
            status.player_to_move,
            uri,
            to_rfc3339(status.last_move_at),
        );
        Ok((created, violation))
    }

    /// Clock state against the canonical position. The Game record's FEN
    /// lags whenever the opponent moved last, so whose-turn comes from the
    /// replayed line, and the newest applied move stamps the clock.
    async fn time_status_of(
        &self,
        uri: &AtUri,
        game: &GameRecord,
        now: DateTime<Utc>,
    ) -> EngineResult<TimeStatus> {
        let time_control = game.time_control.clone().ok_or(EngineError::NoTimeControl)?;
        if !time_control.is_valid() {
            return Err(EngineError::InvalidInput(format!(
                "game carries unsupported time control {}",
                time_control.control_type
            )));
        }

        let replayed = self.replay_from(uri, game).await?;
        let last_move_at = match replayed.moves.last() {
            Some(mv) => parse_rfc3339(&mv.created_at)?,
            None => parse_rfc3339(&game.created_at)?,
        };
        let allowance = Duration::hours(24 * i64::from(time_control.days_per_move));
        let deadline = last_move_at + allowance;
        let side_to_move = Side::from_fen(&replayed.fen)?;
        let player_to_move = match side_to_move {
            Side::White => game.white.clone(),
            Side::Black => game.black.clone(),
        };
        let active =
            game.status == GameStatus::Active && replayed.status == GameStatus::Active;

        Ok(TimeStatus {
            time_control,
            side_to_move,
            player_to_move,
            last_move_at,
            deadline,
            remaining_seconds: (deadline - now).num_seconds().max(0),
            violated: active && now > deadline,
            abandoned: active && now > last_move_at + allowance * ABANDONMENT_FACTOR as i32,
        })
    }
}

impl TimeStatus {
    /// One full time control as a duration
    pub fn allowance(&self) -> Duration {
        Duration::hours(24 * i64::from(self.time_control.days_per_move))
    }
}
