//! Service wiring and game lifecycle

use crate::error::{EngineError, EngineResult};
use atchess_pdr::{RecordRef, RepoClient};
use atchess_records::{
    collections, now_rfc3339, AtUri, ColorChoice, GameRecord, GameStatus, StrongRef, TimeControl,
};
use atchess_rules::{RulesEngine, ShakmatyRules, INITIAL_FEN};
use serde_json::to_value;
use tracing::info;

/// Upper bound used when listing a collection
pub(crate) const LIST_LIMIT: u32 = 100;

/// Business operations over the caller's (and, read-only, the opponent's)
/// repositories. One instance per authenticated identity.
pub struct ChessService<C: RepoClient, R: RulesEngine = ShakmatyRules> {
    pub(crate) client: C,
    pub(crate) rules: R,
}

impl<C: RepoClient> ChessService<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            rules: ShakmatyRules::new(),
        }
    }
}

impl<C: RepoClient, R: RulesEngine> ChessService<C, R> {
    /// Swap in a different move validator
    pub fn with_rules(client: C, rules: R) -> Self {
        Self { client, rules }
    }

    /// DID this service acts as
    pub fn did(&self) -> &str {
        self.client.did()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create a game against `opponent` in the caller's repository.
    ///
    /// `color` is the challenger's requested color; when the game comes out
    /// of a challenge the opponent is the challenger, otherwise the caller
    /// is. Random assignment gives the challenger white.
    pub async fn create_game(
        &self,
        opponent: &str,
        color: ColorChoice,
        opts: CreateGameOptions,
    ) -> EngineResult<(RecordRef, GameRecord)> {
        let caller = self.client.did().to_string();
        if opponent == caller {
            return Err(EngineError::InvalidInput(
                "cannot play against yourself".to_string(),
            ));
        }
        if let Some(tc) = &opts.time_control {
            if !tc.is_valid() {
                return Err(EngineError::InvalidInput(format!(
                    "unsupported time control: {} at {} days/move",
                    tc.control_type, tc.days_per_move
                )));
            }
        }

        let challenger = if opts.challenge.is_some() {
            opponent.to_string()
        } else {
            caller.clone()
        };
        let other = if challenger == caller {
            opponent.to_string()
        } else {
            caller.clone()
        };
        let (white, black) = match color {
            ColorChoice::White | ColorChoice::Random => (challenger, other),
            ColorChoice::Black => (other, challenger),
        };

        let now = now_rfc3339();
        let game = GameRecord {
            record_type: collections::GAME.to_string(),
            white,
            black,
            status: GameStatus::Active,
            fen: INITIAL_FEN.to_string(),
            pgn: String::new(),
            challenge: opts.challenge,
            time_control: opts.time_control,
            created_at: now.clone(),
            updated_at: now,
        };

        let created = self
            .client
            .create_record(
                &caller,
                collections::GAME,
                to_value(&game).expect("game record serializes"),
                opts.rkey.as_deref(),
            )
            .await?;
        info!(
            "[GAME] created {} ({} vs {})",
            created.uri, game.white, game.black
        );
        Ok((created, game))
    }

    /// Fetch a game by URI, returning its current CID alongside the record
    pub async fn get_game(&self, game_uri: &str) -> EngineResult<(String, GameRecord)> {
        let uri = AtUri::parse(game_uri)?;
        if uri.collection != collections::GAME {
            return Err(EngineError::InvalidInput(format!(
                "{game_uri} is not a game record"
            )));
        }
        let fetched = self
            .client
            .get_record(&uri.did, &uri.collection, &uri.rkey)
            .await?;
        let game: GameRecord =
            serde_json::from_value(fetched.value).map_err(atchess_records::RecordError::from)?;
        Ok((fetched.cid, game))
    }

    /// Games in the caller's own repository that are still active
    pub async fn list_active_games(&self) -> EngineResult<Vec<(String, String, GameRecord)>> {
        let records = self
            .client
            .list_records(self.client.did(), collections::GAME, LIST_LIMIT)
            .await?;
        let mut active = Vec::new();
        for record in records {
            let Ok(game) = serde_json::from_value::<GameRecord>(record.value) else {
                continue;
            };
            if game.status == GameStatus::Active {
                active.push((record.uri, record.cid, game));
            }
        }
        Ok(active)
    }

    /// Fetch + participant check shared by move/draw/resign/time paths
    pub(crate) async fn fetch_game_as_participant(
        &self,
        game_uri: &str,
    ) -> EngineResult<(AtUri, String, GameRecord)> {
        let uri = AtUri::parse(game_uri)?;
        let (cid, game) = self.get_game(game_uri).await?;
        if !game.is_participant(self.client.did()) {
            return Err(EngineError::NotParticipant);
        }
        Ok((uri, cid, game))
    }

    /// True when the game record lives in the caller's own repository
    pub(crate) fn owns(&self, uri: &AtUri) -> bool {
        uri.did == self.client.did()
    }

    pub(crate) fn game_ref(&self, uri: &AtUri, cid: &str) -> StrongRef {
        StrongRef::new(uri.to_string(), cid)
    }
}

/// Optional knobs for [`ChessService::create_game`]
#[derive(Debug, Default, Clone)]
pub struct CreateGameOptions {
    /// Explicit rkey (deterministic proposed-game ids); host assigns when absent
    pub rkey: Option<String>,
    /// Challenge this game fulfils
    pub challenge: Option<StrongRef>,
    pub time_control: Option<TimeControl>,
}
