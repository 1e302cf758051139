//! Game Server Module
//!
//! Runs the two-car slot racing simulation in Rust. The JS frontend drives
//! the engine through [`simulation::GameServer`] and consumes per-tick
//! snapshots; rendering, audio playback and controller polling all live on
//! the other side of that boundary.

use thiserror::Error;

pub mod car;
pub mod race;
pub mod simulation;
pub mod track;
pub mod track_piece;

pub use car::{CarState, Physics};
pub use race::{DriverResult, RaceConfig, RaceEvent, RaceResults, RaceStatus};
pub use simulation::{GameServer, GameState};
pub use track::Track;
pub use track_piece::{Lane, TrackPiece};

/// Engine-level failures. All are programmer-error class; nothing is retried.
#[derive(Debug, Error)]
pub enum GameError {
    /// Unrecognized piece token in a track description.
    #[error("invalid track piece: {0:?}")]
    InvalidPiece(String),

    /// Player index outside the two-car roster.
    #[error("invalid player index: {0}")]
    InvalidPlayer(usize),

    /// A serialized driver result that does not match the expected shape.
    #[error("malformed driver result: {0}")]
    MalformedResult(#[from] serde_json::Error),
}
