//! Track - piece chain assembly and car advancement
//!
//! Assembles a token list ('s', 'ss', 'r1'..'r4', 'l1'..'l4') into a chained
//! loop of [`TrackPiece`]s and advances the two cars along it each tick,
//! reporting lap-boundary crossings and crashes as [`RaceEvent`]s.

use crate::game_server::car::{CarState, Physics};
use crate::game_server::race::RaceEvent;
use crate::game_server::track_piece::{heading_vec, Lane, TrackPiece};
use crate::game_server::GameError;

/// Centerline length of a standard straight ('s').
const STRAIGHT_LEN: f32 = 87.5;
/// Centerline length of the short straight ('ss') some layouts need.
const SHORT_STRAIGHT_LEN: f32 = 78.0;
/// Curve radii for size codes 1..4.
const CURVE_RADII: [f32; 4] = [214.0, 370.0, 526.0, 682.0];

/// Assembly starts here; a well-formed token list loops back to it.
const START_POS: [f32; 2] = [0.0, 0.0];
const START_ANGLE: f32 = 90.0;

/// Draw order for fallen-out cars: above every track piece.
const FALLEN_DRAW_ORDER: i32 = 400;

/// The assembled circuit plus the two car states riding it.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub pieces: Vec<TrackPiece>,
    pub left_car: CarState,
    pub right_car: CarState,
}

impl Track {
    /// Assemble a track from piece tokens, threading each piece's end
    /// position/angle into the next piece's start. Any unrecognized token
    /// aborts assembly; there is no partial track.
    pub fn from_tokens(name: &str, tokens: &[&str]) -> Result<Self, GameError> {
        let mut pieces = Vec::with_capacity(tokens.len());
        let mut pos = START_POS;
        let mut angle = START_ANGLE;

        for (z_index, token) in tokens.iter().enumerate() {
            let piece = Self::piece_from_token(token, pos, angle, z_index as u32)?;
            pos = piece.end_pos;
            angle = piece.end_angle;
            pieces.push(piece);
        }

        Ok(Self {
            name: name.to_owned(),
            pieces,
            left_car: CarState::new(0, Lane::Left),
            right_car: CarState::new(1, Lane::Right),
        })
    }

    fn piece_from_token(
        token: &str,
        pos: [f32; 2],
        angle: f32,
        z_index: u32,
    ) -> Result<TrackPiece, GameError> {
        let (radius, size) = match token {
            "s" => (0.0, STRAIGHT_LEN),
            "ss" => (0.0, SHORT_STRAIGHT_LEN),
            _ => {
                let mut chars = token.chars();
                let sign = match chars.next() {
                    Some('r') => 1.0,
                    Some('l') => -1.0,
                    _ => return Err(GameError::InvalidPiece(token.to_owned())),
                };
                let radius = match chars.next() {
                    Some(c @ '1'..='4') if chars.next().is_none() => {
                        CURVE_RADII[c as usize - '1' as usize]
                    }
                    _ => return Err(GameError::InvalidPiece(token.to_owned())),
                };
                (sign * radius, 0.0)
            }
        };
        Ok(TrackPiece::new(radius, size, pos, angle, z_index))
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Release both cars to respond to throttle input.
    pub fn release_cars(&mut self) {
        self.left_car.enabled = true;
        self.right_car.enabled = true;
    }

    /// Per-tick entry point. Physics runs before advancement (advancement
    /// consumes the speed physics just computed), and the left car is always
    /// processed before the right car so same-tick events are ordered
    /// deterministically.
    pub fn update_cars(&mut self, delta: f32, events: &mut Vec<RaceEvent>) {
        self.apply_physics(delta, events);
        self.move_cars(delta, events);
        self.position_cars();
        self.update_engine_feedback();
    }

    fn apply_physics(&mut self, delta: f32, events: &mut Vec<RaceEvent>) {
        let idx = self.left_car.current_piece;
        Physics::apply(delta, &mut self.left_car, &self.pieces[idx], events);
        let idx = self.right_car.current_piece;
        Physics::apply(delta, &mut self.right_car, &self.pieces[idx], events);
    }

    fn move_cars(&mut self, delta: f32, events: &mut Vec<RaceEvent>) {
        Self::move_car(&self.pieces, &mut self.left_car, delta, events);
        Self::move_car(&self.pieces, &mut self.right_car, delta, events);
    }

    /// Advance one car's distance along the piece chain. A fallen-out car
    /// instead coasts in a straight line along its pre-crash heading.
    ///
    /// The boundary loop repeats because a single tick may cross several
    /// piece boundaries; entering piece 0 is the lap-completion signal.
    fn move_car(
        pieces: &[TrackPiece],
        car: &mut CarState,
        delta: f32,
        events: &mut Vec<RaceEvent>,
    ) {
        if car.fallen_out() {
            let dir = heading_vec(car.heading);
            car.pos[0] += car.speed * delta * dir[0];
            car.pos[1] += car.speed * delta * dir[1];
            return;
        }

        let mut dist = car.distance_on_piece + delta * car.speed;
        while dist > pieces[car.current_piece].length(car.lane) {
            dist -= pieces[car.current_piece].length(car.lane);
            car.total_pieces += 1;
            car.current_piece = car.total_pieces as usize % pieces.len();
            car.current_lap = car.total_pieces / pieces.len() as u32;
            if car.current_piece == 0 {
                events.push(RaceEvent::LapBoundaryCrossed {
                    player: car.player_index,
                });
            }
        }
        car.distance_on_piece = dist;
    }

    fn position_cars(&mut self) {
        Self::position_car(&self.pieces, &mut self.left_car);
        Self::position_car(&self.pieces, &mut self.right_car);
    }

    /// Refresh a car's rendered position, heading and draw order. Fallen-out
    /// cars keep their extrapolated position and pre-crash heading and are
    /// pinned above the whole track.
    fn position_car(pieces: &[TrackPiece], car: &mut CarState) {
        if car.fallen_out() {
            car.draw_order = FALLEN_DRAW_ORDER;
            return;
        }

        let piece = &pieces[car.current_piece];
        car.pos = piece.find_pos(car.distance_on_piece, car.lane);
        car.heading = piece.find_angle(car.distance_on_piece, car.lane);

        // A car rides a few layers above its own piece; on the first two
        // pieces that layer wraps past the track end so a car crossing the
        // seam never slides under the final pieces.
        let mut z = piece.z_index as i32 + 4;
        if z < 6 {
            z += pieces.len() as i32;
        }
        car.draw_order = z;
    }

    /// Scalars the audio collaborator applies to the idle engine loop.
    fn update_engine_feedback(&mut self) {
        for car in [&mut self.left_car, &mut self.right_car] {
            car.engine_speed = 1.0 + car.speed / Physics::MAX_SPEED;
            car.engine_volume = 0.5 + car.power / 2.0;
        }
    }
}
