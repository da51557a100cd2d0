//! Canonical wire shapes for every chess record kind
//!
//! Field names are camelCase on the wire and timestamps are RFC 3339 UTC
//! strings. Each record carries its collection NSID in a `$type` field the
//! way repository hosts expect; deserialization tolerates its absence so
//! values read back from older repositories still parse.

use crate::collections;
use serde::{Deserialize, Serialize};

/// URI + CID pair pinning a record at a known revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    pub cid: String,
}

impl StrongRef {
    pub fn new(uri: impl Into<String>, cid: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cid: cid.into(),
        }
    }
}

/// Correspondence time control settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Only `correspondence` is supported
    #[serde(rename = "type")]
    pub control_type: String,
    #[serde(rename = "daysPerMove")]
    pub days_per_move: u32,
}

impl TimeControl {
    /// Days-per-move correspondence control; valid range is 1..=7 days
    pub fn correspondence(days_per_move: u32) -> Self {
        Self {
            control_type: "correspondence".to_string(),
            days_per_move,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.control_type == "correspondence" && (1..=7).contains(&self.days_per_move)
    }
}

/// Game lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    Active,
    Draw,
    WhiteWon,
    BlackWon,
    Abandoned,
}

impl GameStatus {
    /// Terminal states are permanent; only `Active` may be entered at creation
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::Active)
    }
}

/// A game. Lives in exactly one player's repository (the challenge accepter)
/// and is the only record kind re-written in place, via CID compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    /// DID of the player with the white pieces
    pub white: String,
    /// DID of the player with the black pieces
    pub black: String,
    pub status: GameStatus,
    /// Current position as FEN
    pub fen: String,
    /// Move log as PGN movetext
    pub pgn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<StrongRef>,
    #[serde(rename = "timeControl", skip_serializing_if = "Option::is_none")]
    pub time_control: Option<TimeControl>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl GameRecord {
    /// DID of the opponent of `did`, if `did` is a participant at all
    pub fn opponent_of(&self, did: &str) -> Option<&str> {
        if self.white == did {
            Some(&self.black)
        } else if self.black == did {
            Some(&self.white)
        } else {
            None
        }
    }

    pub fn is_participant(&self, did: &str) -> bool {
        self.white == did || self.black == did
    }
}

/// A single move, written to the moving player's own repository. The `game`
/// ref pins the Game record CID observed immediately before the move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub game: StrongRef,
    /// Origin square, e.g. `e2`
    pub from: String,
    /// Destination square, e.g. `e4`
    pub to: String,
    pub san: String,
    /// Position after the move
    pub fen: String,
    pub check: bool,
    pub checkmate: bool,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Challenge lifecycle status. Challenge records are immutable; everything
/// but `pending` is derived by observers (a game with a matching ref means
/// accepted, a past `expiresAt` means expired).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

/// Requested color from the challenger's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    White,
    Black,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub challenger: String,
    pub challenged: String,
    pub color: ColorChoice,
    #[serde(rename = "timeControl", skip_serializing_if = "Option::is_none")]
    pub time_control: Option<TimeControl>,
    /// Deterministic rkey the game will use if the challenge is accepted
    #[serde(rename = "proposedGameId", skip_serializing_if = "Option::is_none")]
    pub proposed_game_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: ChallengeStatus,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// Always createdAt + 24h
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

/// Best-effort copy of a challenge written into the challenged player's
/// repository so their client can surface it without scanning the firehose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeNotificationRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub challenge: StrongRef,
    pub challenger: String,
    #[serde(rename = "challengerHandle")]
    pub challenger_handle: String,
    pub color: ColorChoice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "timeControl", skip_serializing_if = "Option::is_none")]
    pub time_control: Option<TimeControl>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawOfferStatus {
    Pending,
    Accepted,
    Declined,
}

/// Draw offer, mutated once when the opponent responds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawOfferRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub game: StrongRef,
    #[serde(rename = "offeredBy")]
    pub offered_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: DrawOfferStatus,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "respondedAt", skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<String>,
    #[serde(rename = "respondedBy", skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResignationRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub game: StrongRef,
    #[serde(rename = "resigningPlayer")]
    pub resigning_player: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// Adjudicated time-forfeit (or abandonment) claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeViolationRecord {
    #[serde(rename = "$type", default)]
    pub record_type: String,
    pub game: StrongRef,
    #[serde(rename = "claimingPlayer")]
    pub claiming_player: String,
    #[serde(rename = "violatingPlayer")]
    pub violating_player: String,
    /// Timestamp the deadline was derived from
    #[serde(rename = "lastMoveAt")]
    pub last_move_at: String,
    #[serde(rename = "timeControl")]
    pub time_control: TimeControl,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_game_status_wire_format() {
        assert_eq!(
            serde_json::to_value(GameStatus::WhiteWon).unwrap(),
            json!("white-won")
        );
        assert_eq!(
            serde_json::to_value(GameStatus::Active).unwrap(),
            json!("active")
        );
        let status: GameStatus = serde_json::from_value(json!("black-won")).unwrap();
        assert_eq!(status, GameStatus::BlackWon);
    }

    #[test]
    fn test_game_record_round_trip() {
        let game = GameRecord {
            record_type: collections::GAME.to_string(),
            white: "did:plc:white".to_string(),
            black: "did:plc:black".to_string(),
            status: GameStatus::Active,
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            pgn: String::new(),
            challenge: None,
            time_control: Some(TimeControl::correspondence(3)),
            created_at: "2026-08-01T12:00:00.000Z".to_string(),
            updated_at: "2026-08-01T12:00:00.000Z".to_string(),
        };

        let value = serde_json::to_value(&game).unwrap();
        assert_eq!(value["$type"], json!("app.atchess.game"));
        assert_eq!(value["timeControl"]["daysPerMove"], json!(3));
        assert_eq!(value["createdAt"], json!("2026-08-01T12:00:00.000Z"));

        let back: GameRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, game);
    }

    #[test]
    fn test_move_record_field_names() {
        let mv = MoveRecord {
            record_type: collections::MOVE.to_string(),
            game: StrongRef::new("at://did:plc:w/app.atchess.game/3k", "bafyabc"),
            from: "e2".to_string(),
            to: "e4".to_string(),
            san: "e4".to_string(),
            fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string(),
            check: false,
            checkmate: false,
            created_at: "2026-08-01T12:00:00.000Z".to_string(),
        };
        let value = serde_json::to_value(&mv).unwrap();
        assert_eq!(value["game"]["cid"], json!("bafyabc"));
        assert_eq!(value["createdAt"], json!("2026-08-01T12:00:00.000Z"));
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_missing_type_field_tolerated() {
        let value = json!({
            "game": { "uri": "at://did:plc:w/app.atchess.game/3k", "cid": "bafyabc" },
            "resigningPlayer": "did:plc:b",
            "createdAt": "2026-08-01T12:00:00.000Z",
        });
        let resignation: ResignationRecord = serde_json::from_value(value).unwrap();
        assert_eq!(resignation.resigning_player, "did:plc:b");
        assert!(resignation.record_type.is_empty());
        assert!(resignation.reason.is_none());
    }

    #[test]
    fn test_time_control_validation() {
        assert!(TimeControl::correspondence(1).is_valid());
        assert!(TimeControl::correspondence(7).is_valid());
        assert!(!TimeControl::correspondence(0).is_valid());
        assert!(!TimeControl::correspondence(8).is_valid());
        let blitz = TimeControl {
            control_type: "blitz".to_string(),
            days_per_move: 3,
        };
        assert!(!blitz.is_valid());
    }

    #[test]
    fn test_opponent_lookup() {
        let game = GameRecord {
            record_type: String::new(),
            white: "did:plc:w".to_string(),
            black: "did:plc:b".to_string(),
            status: GameStatus::Active,
            fen: String::new(),
            pgn: String::new(),
            challenge: None,
            time_control: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(game.opponent_of("did:plc:w"), Some("did:plc:b"));
        assert_eq!(game.opponent_of("did:plc:b"), Some("did:plc:w"));
        assert_eq!(game.opponent_of("did:plc:x"), None);
        assert!(!game.is_participant("did:plc:x"));
    }

    #[test]
    fn test_color_choice_wire_format() {
        assert_eq!(
            serde_json::to_value(ColorChoice::Random).unwrap(),
            json!("random")
        );
    }
}
