//! Particle data structures and spawning utilities.
//!
//! A [`Particle`] is a plain state record owned by the
//! [`ParticleSystem`](super::system::ParticleSystem). Integrators write its
//! position and velocity, forces accumulate into `force`, and colliders
//! correct position and velocity after each step.

use bevy::math::DVec3;
use bevy::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Default display color for particles.
pub const DEFAULT_PARTICLE_COLOR: Color = Color::srgb(25.0 / 255.0, 151.0 / 255.0, 136.0 / 255.0);

/// A point mass.
#[derive(Clone, Debug)]
pub struct Particle {
    /// Index of this particle inside its system.
    pub id: usize,
    /// Current position.
    pub pos: DVec3,
    /// Position before the most recent integration step.
    pub prev_pos: DVec3,
    /// Current velocity.
    pub vel: DVec3,
    /// Force accumulator, rebuilt on every derivative evaluation.
    pub force: DVec3,
    /// Mass, must be positive.
    pub mass: f64,
    /// Display radius.
    pub radius: f64,
    /// SPH density (fluid particles only).
    pub density: f64,
    /// SPH pressure (fluid particles only).
    pub pressure: f64,
    /// Display color, never read by the physics.
    pub color: Color,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            id: 0,
            pos: DVec3::ZERO,
            prev_pos: DVec3::ZERO,
            vel: DVec3::ZERO,
            force: DVec3::ZERO,
            mass: 1.0,
            radius: 1.0,
            density: 0.0,
            pressure: 0.0,
            color: DEFAULT_PARTICLE_COLOR,
        }
    }
}

impl Particle {
    /// Create a resting particle at a given position.
    pub fn new(pos: DVec3) -> Self {
        Self {
            pos,
            prev_pos: pos,
            ..default()
        }
    }

    /// Set initial velocity.
    pub fn with_velocity(mut self, vel: DVec3) -> Self {
        self.vel = vel;
        self
    }

    /// Set mass.
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Set display radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set display color.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Acceleration implied by the accumulated force.
    #[inline]
    pub fn acceleration(&self) -> DVec3 {
        self.force / self.mass
    }

    /// Displacement over the most recent step.
    #[inline]
    pub fn displacement(&self) -> DVec3 {
        self.pos - self.prev_pos
    }
}

/// A regular block of particles, optionally jittered.
///
/// Positions are laid out x-major, then y, then z, so that
/// `index = (i * ny + j) * nz + k`.
#[derive(Clone, Debug)]
pub struct ParticleBlock {
    /// Number of particles along each axis.
    pub count: [usize; 3],
    /// Spacing between neighbouring particles per axis.
    pub spacing: DVec3,
    /// Position of the first particle.
    pub origin: DVec3,
    /// Maximum horizontal (x/z) displacement applied to each particle.
    pub jitter: f64,
    /// Seed for the jitter generator.
    pub seed: u64,
}

impl Default for ParticleBlock {
    fn default() -> Self {
        Self {
            count: [8, 8, 8],
            spacing: DVec3::ONE,
            origin: DVec3::ZERO,
            jitter: 0.0,
            seed: 0,
        }
    }
}

impl ParticleBlock {
    /// Create a block of `count` particles spaced `spacing` apart from `origin`.
    pub fn new(count: [usize; 3], spacing: f64, origin: DVec3) -> Self {
        Self {
            count,
            spacing: DVec3::splat(spacing),
            origin,
            ..default()
        }
    }

    /// Add seeded horizontal jitter so columns don't stack perfectly.
    pub fn with_jitter(mut self, jitter: f64, seed: u64) -> Self {
        self.jitter = jitter;
        self.seed = seed;
        self
    }

    /// Total number of particles in the block.
    pub fn len(&self) -> usize {
        self.count[0] * self.count[1] * self.count[2]
    }

    /// Check if the block holds no particles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate particle positions for this block.
    pub fn positions(&self) -> Vec<DVec3> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut positions = Vec::with_capacity(self.len());

        for i in 0..self.count[0] {
            for j in 0..self.count[1] {
                for k in 0..self.count[2] {
                    let mut pos = self.origin
                        + DVec3::new(i as f64, j as f64, k as f64) * self.spacing;
                    if self.jitter > 0.0 {
                        pos.x += rng.gen_range(-self.jitter..=self.jitter);
                        pos.z += rng.gen_range(-self.jitter..=self.jitter);
                    }
                    positions.push(pos);
                }
            }
        }

        positions
    }

    /// Generate resting particles with the given mass and display radius.
    pub fn particles(&self, mass: f64, radius: f64) -> Vec<Particle> {
        self.positions()
            .into_iter()
            .map(|pos| Particle::new(pos).with_mass(mass).with_radius(radius))
            .collect()
    }
}

/// GPU-compatible particle instance layout for the renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    /// Position (xyz) + display radius (w).
    pub position_radius: [f32; 4],
    /// Velocity (xyz) + density (w).
    pub velocity_density: [f32; 4],
    /// Color (linear rgba).
    pub color: [f32; 4],
}

impl From<&Particle> for GpuParticle {
    fn from(p: &Particle) -> Self {
        let color = p.color.to_linear();
        Self {
            position_radius: [p.pos.x as f32, p.pos.y as f32, p.pos.z as f32, p.radius as f32],
            velocity_density: [p.vel.x as f32, p.vel.y as f32, p.vel.z as f32, p.density as f32],
            color: [color.red, color.green, color.blue, color.alpha],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_particle_at_rest() {
        let p = Particle::new(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(p.prev_pos, p.pos);
        assert_eq!(p.vel, DVec3::ZERO);
        assert_eq!(p.mass, 1.0);
        assert_eq!(p.density, 0.0);
        assert_eq!(p.pressure, 0.0);
    }

    #[test]
    fn test_block_layout() {
        let block = ParticleBlock::new([2, 3, 4], 0.5, DVec3::new(1.0, 0.0, 0.0));
        let positions = block.positions();

        assert_eq!(positions.len(), 24);
        assert_eq!(positions[0], DVec3::new(1.0, 0.0, 0.0));
        // (i=1, j=2, k=3)
        assert_eq!(positions[(1 * 3 + 2) * 4 + 3], DVec3::new(1.5, 1.0, 1.5));
    }

    #[test]
    fn test_block_jitter_is_deterministic() {
        let block = ParticleBlock::new([3, 3, 3], 1.0, DVec3::ZERO).with_jitter(0.5, 42);
        let a = block.positions();
        let b = block.positions();
        assert_eq!(a, b);

        let regular = ParticleBlock::new([3, 3, 3], 1.0, DVec3::ZERO).positions();
        for (jittered, base) in a.iter().zip(&regular) {
            assert_eq!(jittered.y, base.y, "jitter must stay horizontal");
            assert!((jittered.x - base.x).abs() <= 0.5);
            assert!((jittered.z - base.z).abs() <= 0.5);
        }
    }

    #[test]
    fn test_gpu_particle_layout() {
        assert_eq!(std::mem::size_of::<GpuParticle>(), 48);

        let p = Particle::new(DVec3::new(1.0, 2.0, 3.0)).with_radius(0.25);
        let gpu = GpuParticle::from(&p);
        assert_eq!(gpu.position_radius, [1.0, 2.0, 3.0, 0.25]);

        let bytes: &[u8] = bytemuck::bytes_of(&gpu);
        assert_eq!(bytes.len(), 48);
    }
}
