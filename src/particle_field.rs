use glam::vec3;
use log::info;
use rand::prelude::*;
use rand_pcg::Pcg64Mcg;

pub const STARFIELD_COUNT: usize = 5000;
pub const STARFIELD_RADIUS: f32 = 1.2;

/// A fixed set of points spread uniformly through a solid sphere.
///
/// Positions are stored flat as consecutive `(x, y, z)` triples so they can be
/// handed to a vertex or storage buffer without repacking.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleField {
    positions: Vec<f32>,
    radius: f32,
}

impl ParticleField {
    pub fn starfield() -> Self {
        Self::generate(STARFIELD_COUNT, STARFIELD_RADIUS)
    }

    /// Samples a new field from a freshly seeded generator. Two calls never
    /// share generator state.
    pub fn generate(count: usize, radius: f32) -> Self {
        let rand_seed: u64 = rand::random();
        info!("Seeded RNG with {}", rand_seed);

        let mut rng = Pcg64Mcg::seed_from_u64(rand_seed);
        Self::generate_with(&mut rng, count, radius)
    }

    /// Rejection samples the bounding cube, keeping only points inside the
    /// sphere. Accepted points are uniform in volume.
    ///
    /// `radius` must be finite and not negative.
    pub fn generate_with(rng: &mut impl Rng, count: usize, radius: f32) -> Self {
        debug_assert!(
            radius.is_finite() && radius >= 0.0,
            "invalid sphere radius {}",
            radius
        );
        let radius_sq = radius * radius;
        let mut positions = Vec::with_capacity(count * 3);

        while positions.len() < count * 3 {
            let p = vec3(
                rng.gen_range(-radius..=radius),
                rng.gen_range(-radius..=radius),
                rng.gen_range(-radius..=radius),
            );
            if p.length_squared() <= radius_sq {
                positions.extend_from_slice(&[p.x, p.y, p.z]);
            }
        }

        Self { positions, radius }
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[cfg(test)]
    pub fn points(&self) -> impl Iterator<Item = glam::Vec3> + '_ {
        self.positions
            .chunks_exact(3)
            .map(|p| vec3(p[0], p[1], p[2]))
    }

    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> ParticleField {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        ParticleField::generate_with(&mut rng, STARFIELD_COUNT, STARFIELD_RADIUS)
    }

    #[test]
    fn starfield_has_fixed_cardinality() {
        let field = ParticleField::starfield();
        assert_eq!(field.len(), 5000);
        assert_eq!(field.positions().len(), 15000);
        assert_eq!(field.points().count(), 5000);
    }

    #[test]
    fn every_point_lies_inside_the_sphere() {
        let field = ParticleField::starfield();
        let limit = STARFIELD_RADIUS * STARFIELD_RADIUS + 1e-5;
        for p in field.points() {
            assert!(p.length_squared() <= limit, "{:?} escapes the sphere", p);
        }
    }

    #[test]
    fn radial_shells_follow_volume() {
        // Four shells of equal thickness hold 1, 7, 19 and 37 parts in 64.
        let field = seeded(7);
        let mut shells = [0usize; 4];
        for p in field.points() {
            let r = p.length() / STARFIELD_RADIUS;
            let shell = ((r * 4.0) as usize).min(3);
            shells[shell] += 1;
        }

        let n = field.len() as f64;
        let expected = [1.0, 7.0, 19.0, 37.0].map(|parts| n * parts / 64.0);
        let chi_sq: f64 = shells
            .iter()
            .zip(expected.iter())
            .map(|(&observed, &expected)| {
                let d = observed as f64 - expected;
                d * d / expected
            })
            .sum();

        assert!(chi_sq < 30.0, "shells {:?} vs {:?}", shells, expected);
        // A per-radius uniform sampler would put a quarter of the points in
        // the innermost shell.
        assert!(shells[0] < 250, "inner shell too dense: {:?}", shells);
    }

    #[test]
    fn axes_are_not_biased_towards_cube_corners() {
        let field = seeded(11);
        let corner = STARFIELD_RADIUS * 0.6;
        let in_corners = field
            .points()
            .filter(|p| p.x.abs() > corner && p.y.abs() > corner && p.z.abs() > corner)
            .count();
        assert_eq!(in_corners, 0);
    }

    #[test]
    fn separate_generations_are_independent() {
        let a = ParticleField::starfield();
        let b = ParticleField::starfield();
        assert_ne!(a.positions(), b.positions());

        let matching = a
            .positions()
            .iter()
            .zip(b.positions())
            .filter(|(x, y)| x == y)
            .count();
        assert!(matching < 10);
    }

    #[test]
    fn same_seed_reproduces_the_field() {
        assert_eq!(seeded(3), seeded(3));
        assert_ne!(seeded(3), seeded(4));
    }

    #[test]
    fn empty_field_is_allowed() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        let field = ParticleField::generate_with(&mut rng, 0, 1.0);
        assert!(field.is_empty());
        assert_eq!(field.radius(), 1.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "invalid sphere radius")]
    fn negative_radius_is_rejected() {
        ParticleField::generate_with(&mut Pcg64Mcg::seed_from_u64(1), 10, -1.0);
    }
}
