//! Record shapes shared across the ATChess federation
//!
//! Every piece of game state is a record in somebody's personal data
//! repository. This crate defines the canonical wire shape of each record
//! kind, the `at://` URI type used to reference them, deterministic record
//! key generation, and the RFC 3339 timestamp helpers every other crate
//! stamps time with.

pub mod collections;
pub mod records;
pub mod rkey;
pub mod time;
pub mod uri;

pub use records::{
    ChallengeNotificationRecord, ChallengeRecord, ChallengeStatus, ColorChoice, DrawOfferRecord,
    DrawOfferStatus, GameRecord, GameStatus, MoveRecord, ResignationRecord, StrongRef,
    TimeControl, TimeViolationRecord,
};
pub use rkey::proposed_game_rkey;
pub use time::{now_rfc3339, parse_rfc3339, to_rfc3339};
pub use uri::AtUri;

use thiserror::Error;

/// Errors produced while parsing or building records
#[derive(Error, Debug)]
pub enum RecordError {
    /// URI does not have the `at://did/collection/rkey` shape
    #[error("Malformed URI: {uri} ({reason})")]
    MalformedUri { uri: String, reason: String },

    /// Record value does not match the expected shape
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    /// Timestamp is not valid RFC 3339
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type alias for record operations
pub type RecordResult<T> = Result<T, RecordError>;
