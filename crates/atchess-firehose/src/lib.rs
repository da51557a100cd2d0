//! Firehose ingest and fan-out
//!
//! A host emits every repository commit on an append-only WebSocket stream.
//! This crate keeps a resumable connection to it, filters the chess
//! collections out of the noise, and fans the resulting events out to
//! per-game and per-player subscribers. Slow subscribers are dropped, never
//! waited on.

pub mod client;
pub mod events;
pub mod frames;
pub mod hub;
pub mod processor;

pub use client::{FirehoseClient, FirehoseHandle};
pub use events::{ChessEvent, EventType};
pub use frames::{decode_frame, encode_frame, FrameHeader, RepoOp};
pub use hub::{GameUpdate, NotificationHub, Subscription};
pub use processor::EventProcessor;

use thiserror::Error;

/// Errors inside the stream machinery
#[derive(Error, Debug)]
pub enum FirehoseError {
    /// Frame did not decode
    #[error("Malformed frame: {0}")]
    Frame(String),

    /// WebSocket transport failure
    #[error("Stream error: {0}")]
    Stream(#[from] tokio_tungstenite::tungstenite::Error),

    /// Host went quiet past the keepalive window
    #[error("Connection silent for {0} seconds")]
    Silent(u64),

    /// Stream ended from the host side
    #[error("Stream closed by host")]
    Closed,

    /// Event consumer went away; no point keeping the stream
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Result type alias for firehose operations
pub type FirehoseResult<T> = Result<T, FirehoseError>;
