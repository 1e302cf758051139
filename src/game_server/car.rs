//! Car - per-car simulation state and physics
//!
//! Each car has a lane, a position along the piece chain, and throttle-driven
//! speed. Physics decides speed, danger level, and the one-way transition
//! into fall-out when a curve is taken too fast.

use serde::{Deserialize, Serialize};

use crate::game_server::race::RaceEvent;
use crate::game_server::track_piece::{Lane, TrackPiece};

/// Complete state for a single car.
///
/// Exactly one of the two motion modes applies at a time, selected by
/// `fall_out_timer`: 0 means track-relative motion along the piece chain,
/// positive means ballistic coasting off-track. The timer never returns to
/// zero within a race.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarState {
    /// Player slot (0 = left lane, 1 = right lane).
    pub player_index: usize,
    /// Which slot the car rides in, fixed for the race.
    pub lane: Lane,
    /// False until the start cue releases the cars.
    pub enabled: bool,
    /// Index of the piece the car is currently on.
    pub current_piece: usize,
    /// Pieces traversed since the start; never decreases.
    pub total_pieces: u32,
    /// Completed laps (`total_pieces / piece_count`).
    pub current_lap: u32,
    /// Distance traveled along the current piece's lane path.
    pub distance_on_piece: f32,
    /// Current speed (px/s).
    pub speed: f32,
    /// Throttle input in [0, 1].
    pub power: f32,
    /// Crash-risk indicator in [0, 1].
    pub danger_level: f32,
    /// 0 while on track; positive and growing once fallen out.
    pub fall_out_timer: f32,
    /// Screen position, updated every tick.
    pub pos: [f32; 2],
    /// Heading in degrees, updated every tick.
    pub heading: f32,
    /// Draw order for the rendering collaborator.
    pub draw_order: i32,
    /// Engine pitch scalar for the audio collaborator.
    pub engine_speed: f32,
    /// Engine volume scalar for the audio collaborator.
    pub engine_volume: f32,
}

impl CarState {
    pub fn new(player_index: usize, lane: Lane) -> Self {
        Self {
            player_index,
            lane,
            enabled: false,
            current_piece: 0,
            total_pieces: 0,
            current_lap: 0,
            distance_on_piece: 0.0,
            speed: 0.0,
            power: 0.0,
            danger_level: 0.0,
            fall_out_timer: 0.0,
            pos: [0.0, 0.0],
            heading: 0.0,
            draw_order: 0,
            engine_speed: 1.0,
            engine_volume: 0.5,
        }
    }

    pub fn fallen_out(&self) -> bool {
        self.fall_out_timer > 0.0
    }

    /// Apply a throttle reading for this tick. An absent controller reads as
    /// the cruise default; out-of-range values are clamped.
    pub fn set_power(&mut self, throttle: Option<f32>) {
        self.power = throttle.unwrap_or(Physics::DEFAULT_POWER).clamp(0.0, 1.0);
    }
}

/// Car physics logic.
///
/// The constants are tuning values, not invariants; they are grouped here so
/// track feel can be adjusted in one place.
pub struct Physics;

impl Physics {
    /// Top speed at full throttle (px/s).
    pub const MAX_SPEED: f32 = 260.0;
    /// Throttle response toward a higher target speed (px/s^2).
    pub const ACCELERATION: f32 = 160.0;
    /// Response toward a lower target speed (px/s^2).
    pub const BRAKING: f32 = 220.0;
    /// Lateral acceleration the tires hold before the car leaves the slot.
    pub const MAX_LATERAL_ACCEL: f32 = 185.0;
    /// Fraction of the traction limit below which danger reads zero.
    pub const DANGER_DEADZONE: f32 = 0.25;
    /// Initial fall-out timer value at the crash instant.
    pub const FALL_OUT_SEED: f32 = 0.5;
    /// Throttle assumed when no controller is attached.
    pub const DEFAULT_POWER: f32 = 0.7;

    /// Update one car for one tick: speed toward the throttle target, danger
    /// from the current piece's curvature, and the crash transition.
    ///
    /// Once fallen out the car stops reading track curvature entirely; it
    /// keeps its crash-instant speed and only the timer advances.
    pub fn apply(delta: f32, car: &mut CarState, piece: &TrackPiece, events: &mut Vec<RaceEvent>) {
        if car.fallen_out() {
            car.fall_out_timer += delta;
            return;
        }

        let target = if car.enabled {
            car.power * Self::MAX_SPEED
        } else {
            0.0
        };

        if car.speed < target {
            car.speed = (car.speed + Self::ACCELERATION * delta).min(target);
        } else if car.speed > target {
            car.speed = (car.speed - Self::BRAKING * delta).max(target);
        }

        car.danger_level = Self::danger(car.speed, piece, car.lane);
        if car.danger_level >= 1.0 {
            car.fall_out_timer = Self::FALL_OUT_SEED;
            events.push(RaceEvent::CrashDetected {
                player: car.player_index,
            });
            log::debug!(
                "car {} fell out at {:.0} px/s on piece radius {}",
                car.player_index,
                car.speed,
                piece.radius
            );
        }
    }

    /// Danger level for a speed on a piece: 0 on straights and below the
    /// cornering deadzone, 1.0 at the traction limit for the lane's radius.
    pub fn danger(speed: f32, piece: &TrackPiece, lane: Lane) -> f32 {
        if piece.is_straight() {
            return 0.0;
        }
        let lateral_accel = speed * speed / piece.lane_radius(lane);
        let ratio = lateral_accel / Self::MAX_LATERAL_ACCEL;
        ((ratio - Self::DANGER_DEADZONE) / (1.0 - Self::DANGER_DEADZONE)).clamp(0.0, 1.0)
    }
}

/// Compact car state for network/IPC transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub player: usize,
    pub pos: [f32; 2],
    pub heading: f32,
    pub draw_order: i32,
    pub speed: f32,
    pub power: f32,
    pub danger_level: f32,
    pub fallen_out: bool,
    pub engine_speed: f32,
    pub engine_volume: f32,
    pub current_lap: u32,
}

impl From<&CarState> for CarSnapshot {
    fn from(state: &CarState) -> Self {
        Self {
            player: state.player_index,
            pos: state.pos,
            heading: state.heading,
            draw_order: state.draw_order,
            speed: state.speed,
            power: state.power,
            danger_level: state.danger_level,
            fallen_out: state.fallen_out(),
            engine_speed: state.engine_speed,
            engine_volume: state.engine_volume,
            current_lap: state.current_lap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn straight() -> TrackPiece {
        TrackPiece::new(0.0, 87.5, [0.0, 0.0], 90.0, 0)
    }

    fn tight_curve() -> TrackPiece {
        TrackPiece::new(214.0, 0.0, [0.0, 0.0], 90.0, 0)
    }

    #[test]
    fn full_power_reaches_and_holds_max_speed() {
        let mut car = CarState::new(0, Lane::Left);
        car.enabled = true;
        car.set_power(Some(1.0));
        let piece = straight();
        let mut events = Vec::new();

        for _ in 0..600 {
            Physics::apply(1.0 / 60.0, &mut car, &piece, &mut events);
        }
        assert_eq!(car.speed, Physics::MAX_SPEED);
        assert_eq!(car.danger_level, 0.0);
        assert!(events.is_empty());

        // Holding the throttle keeps the plateau.
        Physics::apply(1.0 / 60.0, &mut car, &piece, &mut events);
        assert_eq!(car.speed, Physics::MAX_SPEED);
    }

    #[test]
    fn disabled_car_does_not_accelerate() {
        let mut car = CarState::new(0, Lane::Left);
        car.set_power(Some(1.0));
        let piece = straight();
        let mut events = Vec::new();

        for _ in 0..120 {
            Physics::apply(1.0 / 60.0, &mut car, &piece, &mut events);
        }
        assert_eq!(car.speed, 0.0);
    }

    #[test]
    fn throttle_defaults_and_clamps() {
        let mut car = CarState::new(0, Lane::Left);
        car.set_power(None);
        assert_abs_diff_eq!(car.power, Physics::DEFAULT_POWER);
        car.set_power(Some(1.5));
        assert_eq!(car.power, 1.0);
        car.set_power(Some(-0.2));
        assert_eq!(car.power, 0.0);
    }

    #[test]
    fn slow_cornering_reads_zero_danger() {
        let piece = tight_curve();
        assert_eq!(Physics::danger(40.0, &piece, Lane::Right), 0.0);
    }

    #[test]
    fn danger_rises_toward_the_traction_limit() {
        let piece = tight_curve();
        // Inside lane radius is 175; the limit speed is sqrt(185 * 175).
        let limit = (Physics::MAX_LATERAL_ACCEL * 175.0).sqrt();
        let below = Physics::danger(limit * 0.8, &piece, Lane::Right);
        let near = Physics::danger(limit * 0.98, &piece, Lane::Right);
        assert!(0.0 < below && below < near && near < 1.0);
        assert_eq!(Physics::danger(limit * 1.01, &piece, Lane::Right), 1.0);
    }

    #[test]
    fn exceeding_the_limit_falls_out_once() {
        let mut car = CarState::new(1, Lane::Right);
        car.enabled = true;
        car.set_power(Some(1.0));
        car.speed = 220.0;
        let piece = tight_curve();
        let mut events = Vec::new();

        Physics::apply(1.0 / 60.0, &mut car, &piece, &mut events);
        assert!(car.fallen_out());
        assert_eq!(car.fall_out_timer, Physics::FALL_OUT_SEED);
        assert_eq!(events, vec![RaceEvent::CrashDetected { player: 1 }]);

        // Fallen out: the timer grows, speed is frozen, no second event.
        let speed = car.speed;
        Physics::apply(1.0 / 60.0, &mut car, &piece, &mut events);
        assert!(car.fall_out_timer > Physics::FALL_OUT_SEED);
        assert_eq!(car.speed, speed);
        assert_eq!(events.len(), 1);
    }
}
