//! Game and move state machine
//!
//! Orchestrates every business operation over the two players'
//! repositories: creating games, recording moves with compare-and-swap,
//! draw offers, resignations, challenges with best-effort notifications,
//! and the correspondence clock. No state lives here; the repositories are
//! the database and observers reconstruct anything this crate derives.

mod challenge;
mod error;
mod moves;
mod offers;
mod replay;
mod service;
mod time;

pub use challenge::{ChallengeCreated, Notification};
pub use error::{EngineError, EngineResult};
pub use moves::MoveReport;
pub use replay::{ReplayedGame, ReplayedMove};
pub use service::{ChessService, CreateGameOptions};
pub use time::TimeStatus;
