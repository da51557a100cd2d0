//! Service backend: configuration, wiring, and the command surface
//!
//! Everything a transport layer (HTTP, CLI, tests) needs to drive the
//! system: an [`context::AppContext`] owning the component stack and the
//! [`api`] command handlers mapping one-to-one onto the public operations.
//! Transport framing itself lives elsewhere.

pub mod api;
pub mod config;
pub mod context;
pub mod error;

pub use config::Config;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
