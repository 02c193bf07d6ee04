use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::{vec3, Quat, Vec3};
use rand::Rng;

/// Gentle bobbing and wobbling of a floating object.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FloatMotion {
    pub speed: f64,
    pub rotation_intensity: f64,
    pub float_intensity: f64,
    offset: f64,
    elapsed: f64,
}

impl FloatMotion {
    pub fn new(speed: f64, rotation_intensity: f64, float_intensity: f64, offset: f64) -> Self {
        Self {
            speed,
            rotation_intensity,
            float_intensity,
            offset,
            elapsed: 0.0,
        }
    }

    /// Settings used for the technology balls, with a random phase so that
    /// neighbouring balls do not move in lockstep.
    pub fn ball(rng: &mut impl Rng) -> Self {
        Self::new(1.75, 1.0, 2.0, rng.gen_range(0.0..10_000.0))
    }

    pub fn advance(&mut self, delta: f64) {
        self.elapsed += delta;
    }

    fn phase(&self) -> f64 {
        (self.offset + self.elapsed) / 4.0 * self.speed
    }

    pub fn rotation(&self) -> Quat {
        let t = self.phase();
        let ri = self.rotation_intensity;
        Quat::from_rotation_x((t.cos() / 8.0 * ri) as f32)
            * Quat::from_rotation_y((t.sin() / 8.0 * ri) as f32)
            * Quat::from_rotation_z((t.sin() / 20.0 * ri) as f32)
    }

    pub fn offset_y(&self) -> f32 {
        (self.phase().sin() / 10.0 * self.float_intensity) as f32
    }
}

const POLE_MARGIN: f64 = 1e-6;

/// Camera orbit around a target with optional auto rotation and drag input.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub radius: f64,
    /// Angle around the y axis, measured from +z towards +x.
    pub azimuth: f64,
    /// Angle from +y.
    pub polar: f64,
    pub min_polar: f64,
    pub max_polar: f64,
    pub auto_rotate_speed: Option<f64>,
}

impl OrbitControls {
    pub fn from_position(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let (x, y, z) = (offset.x as f64, offset.y as f64, offset.z as f64);
        let radius = (x * x + y * y + z * z).sqrt();
        let polar = if radius > 0.0 {
            (y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        Self {
            target,
            radius,
            azimuth: x.atan2(z),
            polar,
            min_polar: 0.0,
            max_polar: PI,
            auto_rotate_speed: None,
        }
    }

    /// Pins the camera to the horizon.
    pub fn horizontal(mut self) -> Self {
        self.min_polar = FRAC_PI_2;
        self.max_polar = FRAC_PI_2;
        self.polar = FRAC_PI_2;
        self
    }

    pub fn auto_rotate(mut self, speed: f64) -> Self {
        self.auto_rotate_speed = Some(speed);
        self
    }

    /// Radians per second for the configured auto rotate speed. A speed of 1
    /// completes an orbit in one minute.
    pub fn angular_velocity(&self) -> f64 {
        self.auto_rotate_speed.map_or(0.0, |speed| TAU / 60.0 * speed)
    }

    pub fn advance(&mut self, delta: f64) {
        self.azimuth -= self.angular_velocity() * delta;
        self.polar = self.clamp_polar(self.polar);
    }

    /// Drag input in radians. Dragging right or down turns the scene the same
    /// way, so both angles decrease. There is no zoom.
    pub fn rotate(&mut self, d_azimuth: f64, d_polar: f64) {
        self.azimuth -= d_azimuth;
        self.polar = self.clamp_polar(self.polar - d_polar);
    }

    /// Keeps the camera off the poles, where the up vector degenerates.
    fn clamp_polar(&self, polar: f64) -> f64 {
        let min = self.min_polar.max(POLE_MARGIN);
        let max = self.max_polar.min(PI - POLE_MARGIN).max(min);
        polar.clamp(min, max)
    }

    pub fn position(&self) -> Vec3 {
        let azimuth = self.azimuth.rem_euclid(TAU);
        let sin_polar = self.polar.sin();
        let offset = vec3(
            (self.radius * sin_polar * azimuth.sin()) as f32,
            (self.radius * self.polar.cos()) as f32,
            (self.radius * sin_polar * azimuth.cos()) as f32,
        );
        self.target + offset
    }

    pub fn animates(&self) -> bool {
        self.auto_rotate_speed.is_some()
    }
}
