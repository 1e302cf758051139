//! Track pieces - geometry for straights and arcs
//!
//! A piece maps a distance traveled along either lane to a position and
//! heading in screen coordinates (y grows downward). Heading 0 points up,
//! 90 points right; turning right increases the heading.

use serde::{Deserialize, Serialize};

/// Lateral distance from the piece centerline to each lane. The track
/// sprites are 156 px wide, so the two slots sit at the quarter points.
pub const LANE_SPACING: f32 = 39.0;

/// Every curved piece sweeps the same angle; a full circle is 16 curves.
pub const ARC_SWEEP_DEG: f32 = 22.5;

/// Which slot a car rides in. Each player keeps one lane for the whole race;
/// on a curve the lane nearer the turn center is the shorter path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lane {
    Left,
    Right,
}

impl Lane {
    /// Signed offset from the centerline along the heading's right-normal.
    pub fn lateral_offset(self) -> f32 {
        match self {
            Lane::Left => -LANE_SPACING,
            Lane::Right => LANE_SPACING,
        }
    }
}

/// Unit direction for a heading in degrees: 0 is up, 90 is right.
pub(crate) fn heading_vec(angle_deg: f32) -> [f32; 2] {
    let rad = angle_deg.to_radians();
    [rad.sin(), -rad.cos()]
}

/// Right-normal of a heading: the direction 90 degrees clockwise on screen.
fn right_normal(angle_deg: f32) -> [f32; 2] {
    let rad = angle_deg.to_radians();
    [rad.cos(), rad.sin()]
}

/// Rotate `point` about `center` by `angle_deg` (clockwise on screen for
/// positive angles, matching the heading convention).
fn rotate_about(point: [f32; 2], center: [f32; 2], angle_deg: f32) -> [f32; 2] {
    let rad = angle_deg.to_radians();
    let (sin, cos) = (rad.sin(), rad.cos());
    let v = [point[0] - center[0], point[1] - center[1]];
    [
        center[0] + v[0] * cos - v[1] * sin,
        center[1] + v[0] * sin + v[1] * cos,
    ]
}

/// One immutable segment of the assembled track.
///
/// `radius == 0` is a straight of centerline length `size`; otherwise the
/// piece is a 22.5 degree arc whose sign encodes the turn direction
/// (positive right, negative left). End position and angle are derived at
/// construction so pieces can be chained end to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPiece {
    pub radius: f32,
    pub size: f32,
    pub start_pos: [f32; 2],
    pub start_angle: f32,
    pub end_pos: [f32; 2],
    pub end_angle: f32,
    /// Sequence ordinal, consumed only by the renderer's draw ordering.
    pub z_index: u32,
}

impl TrackPiece {
    pub fn new(radius: f32, size: f32, start_pos: [f32; 2], start_angle: f32, z_index: u32) -> Self {
        let (end_pos, end_angle) = if radius == 0.0 {
            let dir = heading_vec(start_angle);
            (
                [start_pos[0] + size * dir[0], start_pos[1] + size * dir[1]],
                start_angle,
            )
        } else {
            let sweep = radius.signum() * ARC_SWEEP_DEG;
            let center = Self::arc_center_for(radius, start_pos, start_angle);
            (
                rotate_about(start_pos, center, sweep),
                (start_angle + sweep).rem_euclid(360.0),
            )
        };

        Self {
            radius,
            size,
            start_pos,
            start_angle,
            end_pos,
            end_angle,
            z_index,
        }
    }

    pub fn is_straight(&self) -> bool {
        self.radius == 0.0
    }

    /// Center of the arc's circle: perpendicular to the entry heading at
    /// distance `|radius|`, on the side the turn bends toward.
    fn arc_center_for(radius: f32, start_pos: [f32; 2], start_angle: f32) -> [f32; 2] {
        let n = right_normal(start_angle);
        [start_pos[0] + radius * n[0], start_pos[1] + radius * n[1]]
    }

    fn arc_center(&self) -> [f32; 2] {
        Self::arc_center_for(self.radius, self.start_pos, self.start_angle)
    }

    /// Radius of the circle a given lane follows around this arc.
    /// Meaningless for straights.
    pub fn lane_radius(&self, lane: Lane) -> f32 {
        self.radius.abs() - self.radius.signum() * lane.lateral_offset()
    }

    /// Path length of this piece for a given lane: `size` for straights,
    /// lane radius times the sweep for arcs.
    pub fn length(&self, lane: Lane) -> f32 {
        if self.is_straight() {
            self.size
        } else {
            self.lane_radius(lane) * ARC_SWEEP_DEG.to_radians()
        }
    }

    /// Position after traveling `distance` along `lane`, for
    /// `0 <= distance <= length(lane)`.
    pub fn find_pos(&self, distance: f32, lane: Lane) -> [f32; 2] {
        let n = right_normal(self.start_angle);
        let lateral = lane.lateral_offset();
        if self.is_straight() {
            let dir = heading_vec(self.start_angle);
            let base = [
                self.start_pos[0] + distance * dir[0],
                self.start_pos[1] + distance * dir[1],
            ];
            [base[0] + lateral * n[0], base[1] + lateral * n[1]]
        } else {
            let lane_start = [
                self.start_pos[0] + lateral * n[0],
                self.start_pos[1] + lateral * n[1],
            ];
            let swept = self.radius.signum() * (distance / self.lane_radius(lane)).to_degrees();
            rotate_about(lane_start, self.arc_center(), swept)
        }
    }

    /// Heading after traveling `distance` along `lane`, in [0, 360).
    pub fn find_angle(&self, distance: f32, lane: Lane) -> f32 {
        if self.is_straight() {
            self.start_angle
        } else {
            let swept = self.radius.signum() * (distance / self.lane_radius(lane)).to_degrees();
            (self.start_angle + swept).rem_euclid(360.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn straight_lane_endpoints_are_exact() {
        let piece = TrackPiece::new(0.0, 87.5, [10.0, 20.0], 90.0, 0);
        assert_eq!(piece.end_angle, 90.0);

        for lane in [Lane::Left, Lane::Right] {
            let n_rad = piece.start_angle.to_radians();
            let n = [n_rad.cos(), n_rad.sin()];
            let lateral = lane.lateral_offset();

            let lane_start = [
                piece.start_pos[0] + lateral * n[0],
                piece.start_pos[1] + lateral * n[1],
            ];
            let lane_end = [
                piece.end_pos[0] + lateral * n[0],
                piece.end_pos[1] + lateral * n[1],
            ];
            assert_eq!(piece.find_pos(0.0, lane), lane_start);
            assert_eq!(piece.find_pos(piece.length(lane), lane), lane_end);
            assert_eq!(piece.length(lane), 87.5);
        }
    }

    #[test]
    fn right_turn_inside_lane_is_shorter() {
        let piece = TrackPiece::new(214.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert!(piece.length(Lane::Right) < piece.length(Lane::Left));
        assert_abs_diff_eq!(piece.lane_radius(Lane::Right), 175.0);
        assert_abs_diff_eq!(piece.lane_radius(Lane::Left), 253.0);
    }

    #[test]
    fn left_turn_inside_lane_is_shorter() {
        let piece = TrackPiece::new(-214.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert!(piece.length(Lane::Left) < piece.length(Lane::Right));
        assert_abs_diff_eq!(piece.lane_radius(Lane::Left), 175.0);
        assert_abs_diff_eq!(piece.lane_radius(Lane::Right), 253.0);
    }

    #[test]
    fn arc_end_angle_adds_signed_sweep() {
        let right = TrackPiece::new(370.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert_abs_diff_eq!(right.end_angle, 112.5, epsilon = 1e-4);

        let left = TrackPiece::new(-370.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert_abs_diff_eq!(left.end_angle, 67.5, epsilon = 1e-4);

        let wrap = TrackPiece::new(370.0, 0.0, [0.0, 0.0], 350.0, 0);
        assert_abs_diff_eq!(wrap.end_angle, 12.5, epsilon = 1e-4);
    }

    #[test]
    fn arc_interpolation_reaches_lane_end() {
        for radius in [214.0_f32, -214.0, 682.0, -682.0] {
            let piece = TrackPiece::new(radius, 0.0, [50.0, -30.0], 45.0, 0);
            for lane in [Lane::Left, Lane::Right] {
                let len = piece.length(lane);
                let end = piece.find_pos(len, lane);

                // The lane end is the centerline end offset along the
                // end heading's right-normal.
                let n_rad = piece.end_angle.to_radians();
                let expected = [
                    piece.end_pos[0] + lane.lateral_offset() * n_rad.cos(),
                    piece.end_pos[1] + lane.lateral_offset() * n_rad.sin(),
                ];
                assert_abs_diff_eq!(end[0], expected[0], epsilon = 1e-2);
                assert_abs_diff_eq!(end[1], expected[1], epsilon = 1e-2);
                assert_abs_diff_eq!(piece.find_angle(len, lane), piece.end_angle, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn right_turn_curves_toward_screen_down() {
        // Heading 90 is +x; a right turn on screen bends toward +y.
        let piece = TrackPiece::new(214.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert!(piece.end_pos[0] > 0.0);
        assert!(piece.end_pos[1] > 0.0);

        let left = TrackPiece::new(-214.0, 0.0, [0.0, 0.0], 90.0, 0);
        assert!(left.end_pos[0] > 0.0);
        assert!(left.end_pos[1] < 0.0);
    }
}
