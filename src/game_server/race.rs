//! Race - result aggregation and race state machine
//!
//! Collects lap-boundary and crash events from the track, keeps the race
//! clock, decides when the race is over, and derives the per-lap times and
//! exportable driver results.

use serde::{Deserialize, Serialize};

use crate::game_server::GameError;

/// Laps a player must complete to end the race.
pub const DEFAULT_LAP_TARGET: u32 = 3;

/// Audio cue the collaborator plays when the countdown begins.
pub const START_CUE: &str = "321go";

/// Race configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Display name of the circuit.
    pub track_name: String,
    /// Piece tokens, in lap order.
    pub pieces: Vec<String>,
    /// Optional display names; `None` falls back to "Player N".
    pub player_names: [Option<String>; 2],
    /// First player to reach this lap count ends the race.
    pub lap_target: u32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        // Stock oval: out, 180 around, back, 180 home.
        let mut pieces = vec!["s", "s"];
        pieces.extend(std::iter::repeat("r1").take(8));
        pieces.extend(["s", "s"]);
        pieces.extend(std::iter::repeat("r1").take(8));

        Self {
            track_name: "Oval".to_owned(),
            pieces: pieces.into_iter().map(str::to_owned).collect(),
            player_names: [None, None],
            lap_target: DEFAULT_LAP_TARGET,
        }
    }
}

/// Discrete simulation events, delivered to [`RaceResults`] in the order the
/// track discovered them within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceEvent {
    /// A car crossed into piece 0: it just started a new lap.
    LapBoundaryCrossed { player: usize },
    /// A car left the track surface.
    CrashDetected { player: usize },
}

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Pending,
    CountingDown,
    Running,
    Finished,
}

/// Handle the audio collaborator passes back when the start cue completes.
/// The generation ties the completion to one specific race, so a callback
/// that outlives its race is ignored instead of mutating a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartCue {
    pub cue: &'static str,
    pub generation: u32,
}

/// Aggregator and state machine for one race.
///
/// During the race `crossings` holds absolute race-clock timestamps of each
/// start/finish crossing; at the finish they are reduced to per-lap
/// durations. The clock is simulation time accumulated from tick deltas,
/// never wall clock, so identical input sequences replay identically.
#[derive(Debug, Clone)]
pub struct RaceResults {
    pub status: RaceStatus,
    generation: u32,
    lap_target: u32,
    track_name: String,
    player_names: [Option<String>; 2],
    clock_ms: f64,
    race_start_ms: f64,
    crossings: [Vec<f64>; 2],
    lap_counts: [u32; 2],
    crash_counts: [u32; 2],
    lap_times: [Vec<u64>; 2],
}

impl RaceResults {
    pub fn new(config: &RaceConfig, generation: u32) -> Self {
        Self {
            status: RaceStatus::Pending,
            generation,
            lap_target: config.lap_target,
            track_name: config.track_name.clone(),
            player_names: config.player_names.clone(),
            clock_ms: 0.0,
            race_start_ms: 0.0,
            crossings: [Vec::new(), Vec::new()],
            lap_counts: [0, 0],
            crash_counts: [0, 0],
            lap_times: [Vec::new(), Vec::new()],
        }
    }

    /// Begin the countdown. Returns the cue handle for the audio
    /// collaborator; the cars stay parked until [`Self::cue_complete`].
    pub fn start(&mut self) -> Option<StartCue> {
        if self.status != RaceStatus::Pending {
            return None;
        }
        self.status = RaceStatus::CountingDown;
        Some(StartCue {
            cue: START_CUE,
            generation: self.generation,
        })
    }

    /// The start cue finished playing. Returns true when this releases the
    /// cars; a stale handle from an earlier race is ignored.
    pub fn cue_complete(&mut self, cue: StartCue) -> bool {
        if cue.generation != self.generation || self.status != RaceStatus::CountingDown {
            return false;
        }
        self.status = RaceStatus::Running;
        self.race_start_ms = self.clock_ms;
        true
    }

    /// Advance the race clock by one tick. The clock freezes at the finish.
    pub fn advance_clock(&mut self, delta: f32) {
        if self.status != RaceStatus::Finished {
            self.clock_ms += f64::from(delta) * 1000.0;
        }
    }

    /// Consume one tick's events in discovery order. Returns true exactly
    /// once: on the tick the race finishes.
    pub fn record_events(&mut self, events: &[RaceEvent]) -> bool {
        if self.status != RaceStatus::Running {
            return false;
        }

        for event in events {
            match *event {
                RaceEvent::LapBoundaryCrossed { player } => {
                    self.crossings[player].push(self.clock_ms);
                    self.lap_counts[player] += 1;
                    log::debug!(
                        "player {} completed lap {} at {:.0} ms",
                        player,
                        self.lap_counts[player],
                        self.clock_ms
                    );
                    if self.check_end_conditions() {
                        return true;
                    }
                }
                RaceEvent::CrashDetected { player } => {
                    self.crash_counts[player] += 1;
                    log::debug!(
                        "player {} crashed ({} total)",
                        player,
                        self.crash_counts[player]
                    );
                }
            }
        }
        false
    }

    /// The race ends as soon as any player reaches the lap target; the
    /// first car home ends the race for both.
    fn should_end_race(&self) -> bool {
        !self.lap_counts.iter().all(|&count| count < self.lap_target)
    }

    fn check_end_conditions(&mut self) -> bool {
        if !self.should_end_race() {
            return false;
        }
        self.status = RaceStatus::Finished;
        self.lap_times = [
            Self::derive_lap_times(&self.crossings[0], self.race_start_ms),
            Self::derive_lap_times(&self.crossings[1], self.race_start_ms),
        ];
        log::info!(
            "race over after {:.0} ms: laps {:?}, crashes {:?}",
            self.clock_ms - self.race_start_ms,
            self.lap_counts,
            self.crash_counts
        );
        true
    }

    /// Reduce absolute crossing timestamps to per-lap durations: each lap is
    /// the gap to the previous crossing, or to the release for lap 1.
    fn derive_lap_times(crossings: &[f64], race_start_ms: f64) -> Vec<u64> {
        let mut laps = Vec::with_capacity(crossings.len());
        let mut last = race_start_ms;
        for &t in crossings {
            laps.push((t - last).round() as u64);
            last = t;
        }
        laps
    }

    fn check_player(&self, player: usize) -> Result<(), GameError> {
        if player < 2 {
            Ok(())
        } else {
            Err(GameError::InvalidPlayer(player))
        }
    }

    /// Race clock since the cars were released.
    pub fn elapsed_ms(&self) -> u64 {
        match self.status {
            RaceStatus::Pending | RaceStatus::CountingDown => 0,
            RaceStatus::Running | RaceStatus::Finished => {
                (self.clock_ms - self.race_start_ms).round() as u64
            }
        }
    }

    /// Time spent on the lap a player is currently driving.
    pub fn current_lap_elapsed_ms(&self, player: usize) -> Result<u64, GameError> {
        self.check_player(player)?;
        match self.status {
            RaceStatus::Pending | RaceStatus::CountingDown => Ok(0),
            RaceStatus::Running | RaceStatus::Finished => {
                let last = self.crossings[player]
                    .last()
                    .copied()
                    .unwrap_or(self.race_start_ms);
                Ok((self.clock_ms - last).round() as u64)
            }
        }
    }

    /// Fastest completed lap so far; `None` until a lap completes.
    pub fn best_lap_ms(&self, player: usize) -> Result<Option<u64>, GameError> {
        self.check_player(player)?;
        Ok(
            Self::derive_lap_times(&self.crossings[player], self.race_start_ms)
                .into_iter()
                .min(),
        )
    }

    pub fn lap_count(&self, player: usize) -> Result<u32, GameError> {
        self.check_player(player)?;
        Ok(self.lap_counts[player])
    }

    pub fn crash_count(&self, player: usize) -> Result<u32, GameError> {
        self.check_player(player)?;
        Ok(self.crash_counts[player])
    }

    pub(crate) fn lap_counts(&self) -> [u32; 2] {
        self.lap_counts
    }

    pub(crate) fn crash_counts(&self) -> [u32; 2] {
        self.crash_counts
    }

    pub(crate) fn best_laps(&self) -> [Option<u64>; 2] {
        [
            Self::derive_lap_times(&self.crossings[0], self.race_start_ms)
                .into_iter()
                .min(),
            Self::derive_lap_times(&self.crossings[1], self.race_start_ms)
                .into_iter()
                .min(),
        ]
    }

    pub(crate) fn current_lap_clocks(&self) -> [u64; 2] {
        let clock = |player: usize| match self.current_lap_elapsed_ms(player) {
            Ok(ms) => ms,
            Err(_) => 0,
        };
        [clock(0), clock(1)]
    }

    /// Exportable record for one player. Lap times are only populated once
    /// the race has finished.
    pub fn driver_result(&self, player: usize) -> Result<DriverResult, GameError> {
        self.check_player(player)?;
        Ok(DriverResult {
            index: player,
            player_name: self.player_names[player].clone(),
            crash_count: self.crash_counts[player],
            lap_times: self.lap_times[player].clone(),
            track_name: self.track_name.clone(),
        })
    }
}

/// Per-player race record, exportable as JSON and reconstructible from the
/// same shape. `lap_times` are whole-millisecond lap durations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResult {
    pub index: usize,
    pub player_name: Option<String>,
    pub crash_count: u32,
    pub lap_times: Vec<u64>,
    pub track_name: String,
}

impl DriverResult {
    /// Display name, defaulting to the player slot.
    pub fn name(&self) -> String {
        match &self.player_name {
            Some(name) => name.clone(),
            None => format!("Player {}", self.index + 1),
        }
    }

    pub fn lap_count(&self) -> usize {
        self.lap_times.len()
    }

    /// Fastest lap; `None` when no laps were completed.
    pub fn best_lap(&self) -> Option<u64> {
        self.lap_times.iter().copied().min()
    }

    pub fn to_json(&self) -> Result<String, GameError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, GameError> {
        Ok(serde_json::from_str(json)?)
    }
}
