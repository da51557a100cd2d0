//! Error types for game operations

use atchess_pdr::PdrError;
use atchess_records::RecordError;
use atchess_rules::RulesError;
use thiserror::Error;

/// Errors that can occur while driving a game
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller input rejected before touching any repository
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record parsing or URI failure
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Position or move rejected by the rules
    #[error(transparent)]
    Rules(#[from] RulesError),

    /// Repository operation failed (includes `Conflict` on lost CAS races)
    #[error(transparent)]
    Pdr(#[from] PdrError),

    /// Caller is neither white nor black in this game
    #[error("Not a participant in this game")]
    NotParticipant,

    /// Caller tried to move out of turn
    #[error("Not your turn to move")]
    NotYourTurn,

    /// Operation requires an active game
    #[error("Game is not active")]
    GameNotActive,

    /// Caller's view of the position is behind the game record
    #[error("Stale position: game has moved on from {expected}")]
    StalePosition { expected: String },

    /// A pending draw offer from this side already exists
    #[error("A draw offer from this side is already pending")]
    DrawOfferPending,

    /// Draw offer has already been responded to
    #[error("Draw offer is not pending")]
    OfferNotPending,

    /// Offerer cannot respond to their own offer
    #[error("Cannot respond to your own draw offer")]
    OwnOffer,

    /// Challenge past its expiry cannot be accepted
    #[error("Challenge expired at {0}")]
    ChallengeExpired(String),

    /// Time claim with no basis
    #[error("No violation: {0}")]
    NoViolation(String),

    /// Time operations need a time control on the game
    #[error("Game has no time control")]
    NoTimeControl,

    /// Record may only be touched by its owner
    #[error("Only the record owner may do that")]
    NotOwner,
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
