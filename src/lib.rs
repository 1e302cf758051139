//! Slot Cars - two-player racing simulation engine
//!
//! Assembles a circuit from discrete track pieces, advances both cars along
//! it under simple slot-car physics, and aggregates laps, crashes and times
//! into race results. The frontend drives [`GameServer`] once per frame and
//! consumes the returned snapshot; rendering, audio playback and controller
//! polling stay on the frontend side of that boundary.
//!
//! A typical frame loop:
//!
//! ```
//! use slotcars::{GameServer, RaceConfig};
//!
//! let mut server = GameServer::new();
//! server.init_race(RaceConfig::default()).unwrap();
//! let cue = server.start_race().unwrap();
//! // ...the audio collaborator plays cue.cue, then:
//! server.cue_complete(cue);
//! let snapshot = server.tick([Some(0.8), None]).unwrap();
//! assert_eq!(snapshot.cars.len(), 2);
//! ```

pub mod game_server;

pub use game_server::car::{CarSnapshot, CarState, Physics};
pub use game_server::race::{
    DriverResult, RaceConfig, RaceEvent, RaceResults, RaceStatus, StartCue, DEFAULT_LAP_TARGET,
    START_CUE,
};
pub use game_server::simulation::{GameServer, GameState, RaceSnapshot, ServerStats};
pub use game_server::track::Track;
pub use game_server::track_piece::{Lane, TrackPiece, ARC_SWEEP_DEG, LANE_SPACING};
pub use game_server::GameError;
