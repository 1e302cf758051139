//! Simulation - Main game server and loop
//!
//! Manages the game server state, handles tick updates, and provides the
//! interface the frontend glue calls each frame.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::game_server::car::CarSnapshot;
use crate::game_server::race::{DriverResult, RaceConfig, RaceResults, RaceStatus, StartCue};
use crate::game_server::track::Track;
use crate::game_server::GameError;

/// Game state for the local two-player mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Idle,
    Loading,
    Ready,
    Racing,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_rate: f32,
    pub avg_tick_time_ms: f32,
    pub car_count: u32,
    pub game_state: GameState,
}

/// Complete race state for one frame, consumed by the rendering and HUD
/// collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub elapsed_ms: u64,
    pub current_lap_elapsed_ms: [u64; 2],
    pub best_laps_ms: [Option<u64>; 2],
    pub lap_counts: [u32; 2],
    pub crash_counts: [u32; 2],
    pub cars: [CarSnapshot; 2],
}

/// Main game server
pub struct GameServer {
    /// Current game state
    state: GameState,
    /// Active circuit and cars (if any)
    track: Option<Track>,
    /// Active race aggregator (if any)
    results: Option<RaceResults>,
    /// Bumped per race; stale start-cue callbacks are matched against it
    generation: u32,
    /// Target tick rate (ticks per second)
    tick_rate: f32,
    /// Last tick timestamp
    last_tick: Instant,
    /// Accumulated tick time for averaging
    tick_times: Vec<f32>,
    /// Whether the simulation is running
    running: bool,
}

impl GameServer {
    /// Create a new game server
    pub fn new() -> Self {
        Self {
            state: GameState::Idle,
            track: None,
            results: None,
            generation: 0,
            tick_rate: 60.0,
            last_tick: Instant::now(),
            tick_times: Vec::with_capacity(60),
            running: false,
        }
    }

    /// Initialize a new race with the given config. Fails without a partial
    /// track when the piece list contains an unknown token.
    pub fn init_race(&mut self, config: RaceConfig) -> Result<(), GameError> {
        self.state = GameState::Loading;
        self.running = false;

        let tokens: Vec<&str> = config.pieces.iter().map(String::as_str).collect();
        let track = match Track::from_tokens(&config.track_name, &tokens) {
            Ok(track) => track,
            Err(err) => {
                self.state = GameState::Idle;
                return Err(err);
            }
        };

        self.generation += 1;
        log::info!(
            "race initialized on {} with {} pieces, lap target {}",
            config.track_name,
            track.piece_count(),
            config.lap_target
        );
        self.results = Some(RaceResults::new(&config, self.generation));
        self.track = Some(track);
        self.state = GameState::Ready;
        Ok(())
    }

    /// Begin the race countdown. Returns the start-cue handle the audio
    /// collaborator must pass back via [`Self::cue_complete`].
    pub fn start_race(&mut self) -> Option<StartCue> {
        if self.state != GameState::Ready {
            return None;
        }
        let cue = self.results.as_mut()?.start()?;
        self.state = GameState::Racing;
        self.running = true;
        self.last_tick = Instant::now();
        log::info!("race countdown started");
        Some(cue)
    }

    /// The start cue finished playing: release the cars. A handle from an
    /// earlier generation (a race that was reset mid-countdown) is ignored.
    pub fn cue_complete(&mut self, cue: StartCue) -> bool {
        let released = match self.results.as_mut() {
            Some(results) => results.cue_complete(cue),
            None => false,
        };
        if released {
            if let Some(track) = self.track.as_mut() {
                track.release_cars();
            }
            log::info!("cars released");
        }
        released
    }

    /// Perform a single simulation tick with this frame's throttle readings
    /// and return the current state.
    pub fn tick(&mut self, inputs: [Option<f32>; 2]) -> Option<RaceSnapshot> {
        if !self.running {
            return self.get_snapshot();
        }

        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        // Track tick timing
        let tick_start = Instant::now();

        self.step(delta, inputs);

        // Record tick time
        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push(tick_time);
        if self.tick_times.len() > 60 {
            self.tick_times.remove(0);
        }

        self.get_snapshot()
    }

    /// Advance the simulation by a fixed delta. Physics, advancement and
    /// event aggregation all happen here, in that order.
    fn step(&mut self, delta: f32, inputs: [Option<f32>; 2]) {
        let (Some(track), Some(results)) = (self.track.as_mut(), self.results.as_mut()) else {
            return;
        };

        track.left_car.set_power(inputs[0]);
        track.right_car.set_power(inputs[1]);

        results.advance_clock(delta);
        let mut events = Vec::new();
        track.update_cars(delta, &mut events);

        if results.record_events(&events) {
            self.state = GameState::Results;
            self.running = false;
        }
    }

    /// Get current race snapshot without advancing the simulation
    pub fn get_snapshot(&self) -> Option<RaceSnapshot> {
        let track = self.track.as_ref()?;
        let results = self.results.as_ref()?;
        Some(RaceSnapshot {
            status: results.status,
            elapsed_ms: results.elapsed_ms(),
            current_lap_elapsed_ms: results.current_lap_clocks(),
            best_laps_ms: results.best_laps(),
            lap_counts: results.lap_counts(),
            crash_counts: results.crash_counts(),
            cars: [
                CarSnapshot::from(&track.left_car),
                CarSnapshot::from(&track.right_car),
            ],
        })
    }

    /// Get the exportable driver results, available once the race is over
    pub fn get_results(&self) -> Option<[DriverResult; 2]> {
        if self.state != GameState::Results {
            return None;
        }
        let results = self.results.as_ref()?;
        match (results.driver_result(0), results.driver_result(1)) {
            (Ok(left), Ok(right)) => Some([left, right]),
            _ => None,
        }
    }

    /// Get server statistics
    pub fn get_stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            tick_rate: self.tick_rate,
            avg_tick_time_ms: avg_tick_time,
            car_count: if self.track.is_some() { 2 } else { 0 },
            game_state: self.state,
        }
    }

    /// Get current game state
    pub fn get_state(&self) -> GameState {
        self.state
    }

    /// Reset to idle state. The generation counter is kept, so a start-cue
    /// callback from the torn-down race can never touch the next one.
    pub fn reset(&mut self) {
        self.state = GameState::Idle;
        self.track = None;
        self.results = None;
        self.running = false;
        self.tick_times.clear();
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume the simulation
    pub fn resume(&mut self) {
        if self.state == GameState::Racing {
            self.running = true;
            self.last_tick = Instant::now();
        }
    }

    /// Check if the simulation is running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn racing_server() -> (GameServer, StartCue) {
        let mut server = GameServer::new();
        server.init_race(RaceConfig::default()).unwrap();
        assert_eq!(server.get_state(), GameState::Ready);
        let cue = server.start_race().unwrap();
        assert_eq!(server.get_state(), GameState::Racing);
        (server, cue)
    }

    #[test]
    fn invalid_track_config_leaves_the_server_idle() {
        let mut server = GameServer::new();
        let config = RaceConfig {
            pieces: vec!["s".to_owned(), "zz".to_owned()],
            ..Default::default()
        };
        assert!(server.init_race(config).is_err());
        assert_eq!(server.get_state(), GameState::Idle);
        assert!(server.get_snapshot().is_none());
    }

    #[test]
    fn cars_stay_parked_until_the_cue_completes() {
        let (mut server, cue) = racing_server();

        for _ in 0..60 {
            server.step(DT, [Some(1.0), Some(1.0)]);
        }
        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.status, RaceStatus::CountingDown);
        assert_eq!(snapshot.cars[0].speed, 0.0);

        assert!(server.cue_complete(cue));
        for _ in 0..60 {
            server.step(DT, [Some(1.0), Some(1.0)]);
        }
        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.status, RaceStatus::Running);
        assert!(snapshot.cars[0].speed > 0.0);
    }

    #[test]
    fn stale_cue_from_a_reset_race_is_ignored() {
        let (mut server, old_cue) = racing_server();
        server.reset();
        assert_eq!(server.get_state(), GameState::Idle);

        server.init_race(RaceConfig::default()).unwrap();
        let new_cue = server.start_race().unwrap();

        assert!(!server.cue_complete(old_cue));
        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.status, RaceStatus::CountingDown);

        assert!(server.cue_complete(new_cue));
        assert_eq!(server.get_snapshot().unwrap().status, RaceStatus::Running);
    }

    #[test]
    fn absent_controllers_read_the_cruise_default() {
        let (mut server, cue) = racing_server();
        server.cue_complete(cue);
        server.step(DT, [None, None]);
        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.cars[0].power, 0.7);
        assert_eq!(snapshot.cars[1].power, 0.7);
    }

    #[test]
    fn full_throttle_cars_fall_out_on_the_first_curve() {
        let (mut server, cue) = racing_server();
        server.cue_complete(cue);

        for _ in 0..1200 {
            server.step(DT, [Some(1.0), Some(1.0)]);
        }

        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.crash_counts, [1, 1]);
        assert!(snapshot.cars[0].fallen_out);
        assert!(snapshot.cars[1].fallen_out);
        // Crashed cars never complete the lap target.
        assert_eq!(snapshot.status, RaceStatus::Running);
        assert!(server.get_results().is_none());
    }

    #[test]
    fn race_runs_to_results_at_safe_throttle() {
        let (mut server, cue) = racing_server();
        server.cue_complete(cue);

        // Both throttles below the tight-curve limit; the inside lane is
        // the shorter path, so the right car finishes first.
        let mut ticks = 0;
        while server.get_state() == GameState::Racing && ticks < 20_000 {
            server.step(DT, [Some(0.6), Some(0.55)]);
            ticks += 1;
        }

        assert_eq!(server.get_state(), GameState::Results);
        let snapshot = server.get_snapshot().unwrap();
        assert_eq!(snapshot.status, RaceStatus::Finished);
        assert_eq!(snapshot.crash_counts, [0, 0]);

        let [left, right] = server.get_results().unwrap();
        assert_eq!(right.lap_count(), 3);
        assert!(left.lap_count() < 3);
        assert!(right.best_lap().is_some());
        assert!(snapshot.elapsed_ms > 0);

        // Finished state is terminal: further ticks change nothing.
        let elapsed = snapshot.elapsed_ms;
        server.step(DT, [Some(1.0), Some(1.0)]);
        assert_eq!(server.get_snapshot().unwrap().elapsed_ms, elapsed);
    }

    #[test]
    fn stats_report_the_roster_and_state() {
        let mut server = GameServer::new();
        assert_eq!(server.get_stats().car_count, 0);
        assert_eq!(server.get_stats().game_state, GameState::Idle);

        server.init_race(RaceConfig::default()).unwrap();
        let stats = server.get_stats();
        assert_eq!(stats.car_count, 2);
        assert_eq!(stats.game_state, GameState::Ready);
        assert_eq!(stats.tick_rate, 60.0);
    }

    #[test]
    fn pause_freezes_ticks_and_resume_continues() {
        let (mut server, cue) = racing_server();
        server.cue_complete(cue);
        assert!(server.is_running());

        server.pause();
        assert!(!server.is_running());
        let before = server.tick([Some(1.0), Some(1.0)]).unwrap();
        assert_eq!(before.cars[0].speed, 0.0);

        server.resume();
        assert!(server.is_running());
    }
}
