use std::f64::consts::{FRAC_PI_4, TAU};

use glam::Quat;

/// Seconds of elapsed time per radian around the x axis.
pub const X_PERIOD_DIVISOR: f64 = 10.0;
/// Seconds of elapsed time per radian around the y axis.
pub const Y_PERIOD_DIVISOR: f64 = 15.0;

/// Constant tilt of the whole group around the z axis.
pub const GROUP_TILT: f32 = FRAC_PI_4 as f32;

/// Slow perpetual rotation of the starfield.
///
/// Both angles run in the negative direction and are never clamped.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RotationState {
    pub angle_x: f64,
    pub angle_y: f64,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances both angles by `delta` seconds of frame time.
    pub fn advance(&mut self, delta: f64) {
        self.angle_x -= delta / X_PERIOD_DIVISOR;
        self.angle_y -= delta / Y_PERIOD_DIVISOR;
    }

    /// Group tilt followed by the animated x/y rotation, applied to the field
    /// as a rigid body.
    pub fn orientation(&self) -> Quat {
        let x = self.angle_x.rem_euclid(TAU) as f32;
        let y = self.angle_y.rem_euclid(TAU) as f32;
        Quat::from_rotation_z(GROUP_TILT) * Quat::from_rotation_x(x) * Quat::from_rotation_y(y)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use glam::Vec3;

    use super::*;

    #[test]
    fn starts_at_rest() {
        let state = RotationState::new();
        assert_eq!(state.angle_x, 0.0);
        assert_eq!(state.angle_y, 0.0);
    }

    #[test]
    fn angles_strictly_decrease() {
        let mut state = RotationState::new();
        for delta in [0.016, 0.033, 0.001, 0.25, 1e-6] {
            let before = state;
            state.advance(delta);
            assert!(state.angle_x < before.angle_x);
            assert!(state.angle_y < before.angle_y);
        }
    }

    #[test]
    fn accumulated_change_is_sum_of_scaled_deltas() {
        let deltas = [0.01, 0.02, 0.5, 0.07];
        let mut state = RotationState::new();
        deltas.iter().for_each(|&d| state.advance(d));

        let total: f64 = deltas.iter().sum();
        assert_abs_diff_eq!(state.angle_x, -total / 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(state.angle_y, -total / 15.0, epsilon = 1e-12);
    }

    #[test]
    fn rotation_is_frame_rate_independent() {
        let mut once = RotationState::new();
        once.advance(1.0);

        let mut ten = RotationState::new();
        (0..10).for_each(|_| ten.advance(0.1));

        assert_abs_diff_eq!(once.angle_x, ten.angle_x, epsilon = 1e-12);
        assert_abs_diff_eq!(once.angle_y, ten.angle_y, epsilon = 1e-12);
    }

    #[test]
    fn ten_seconds_at_sixty_hertz() {
        let mut frames = RotationState::new();
        (0..600).for_each(|_| frames.advance(1.0 / 60.0));

        let mut single = RotationState::new();
        single.advance(10.0);

        assert_abs_diff_eq!(frames.angle_x, -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frames.angle_y, -10.0 / 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frames.angle_x, single.angle_x, epsilon = 1e-9);
        assert_abs_diff_eq!(frames.angle_y, single.angle_y, epsilon = 1e-9);
    }

    #[test]
    fn angles_are_unbounded() {
        let mut state = RotationState::new();
        state.advance(1_000_000.0);
        assert_abs_diff_eq!(state.angle_x, -100_000.0, epsilon = 1e-6);
    }

    #[test]
    fn orientation_survives_long_sessions() {
        let short = RotationState {
            angle_x: -0.5,
            angle_y: -0.25,
        };
        let long = RotationState {
            angle_x: -0.5 - TAU * 10_000.0,
            angle_y: -0.25 - TAU * 20_000.0,
        };

        let point = Vec3::new(0.3, -0.7, 1.1);
        let a = short.orientation() * point;
        let b = long.orientation() * point;
        assert!(a.abs_diff_eq(b, 1e-4), "{:?} != {:?}", a, b);
    }

    #[test]
    fn orientation_at_rest_is_group_tilt() {
        let tilt = RotationState::new().orientation() * Vec3::X;
        let expected = Vec3::new(GROUP_TILT.cos(), GROUP_TILT.sin(), 0.0);
        assert!(tilt.abs_diff_eq(expected, 1e-6));
    }
}
