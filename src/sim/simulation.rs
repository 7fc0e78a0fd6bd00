//! Simulation tick: integrate, then resolve collisions.
//!
//! [`Simulation`] bundles a [`ParticleSystem`] with the integrator, the
//! colliders and the response coefficients chosen by a scene, and advances
//! everything by one step in [`Simulation::tick`].

use bevy::log::trace;
use bevy::math::DVec3;
use bevy::prelude::*;

use super::cloth::{Cloth, ClothBuilder};
use super::collider::Collider;
use super::error::SimError;
use super::force::{ConstantAcceleration, Force};
use super::integrator::Integrator;
use super::params::{SimParams, SphParams};
use super::particle::{Particle, ParticleBlock};
use super::sph::Sph;
use super::system::{ForceId, ParticleSystem};

/// Provot relaxation passes per tick for cloth scenes.
const DEFAULT_RELAX_ITERATIONS: usize = 2;

/// Summary of one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickStats {
    /// Collider contacts resolved during the tick.
    pub collisions: usize,
    /// Largest particle speed after collision response.
    pub max_speed: f64,
}

/// Particle system plus the scene state needed to step it.
#[derive(Resource, Debug)]
pub struct Simulation {
    pub system: ParticleSystem,
    pub integrator: Integrator,
    /// Tested in order; each resolution feeds the next test.
    pub colliders: Vec<Collider>,
    pub k_elastic: f64,
    pub k_friction: f64,
    /// Number of completed ticks.
    pub steps: u64,
    /// Gravity force every spawned particle is registered with.
    gravity: ForceId,
    /// SPH force, if fluid particles were spawned.
    fluid: Option<ForceId>,
    cloth: Option<Cloth>,
    relax_iterations: usize,
}

impl Default for Simulation {
    fn default() -> Self {
        let mut system = ParticleSystem::new();
        let params = SimParams::default();
        let gravity = system.add_force(ConstantAcceleration::new(params.gravity));
        Self {
            system,
            integrator: params.integrator,
            colliders: Vec::new(),
            k_elastic: params.k_elastic,
            k_friction: params.k_friction,
            steps: 0,
            gravity,
            fluid: None,
            cloth: None,
            relax_iterations: DEFAULT_RELAX_ITERATIONS,
        }
    }
}

impl Simulation {
    /// Empty simulation configured from validated `params`.
    pub fn from_params(params: &SimParams) -> Result<Self, SimError> {
        params.validate()?;
        let mut sim = Self {
            integrator: params.integrator,
            k_elastic: params.k_elastic,
            k_friction: params.k_friction,
            ..Default::default()
        };
        sim.set_gravity(params.gravity);
        Ok(sim)
    }

    /// Dam break: a jittered block of fluid in an open box.
    ///
    /// The floor sits at `y = 0` and four walls face inwards at `x = ±half`
    /// and `z = ±half`.
    pub fn fluid_scene(
        params: &SimParams,
        block: &ParticleBlock,
        half: f64,
    ) -> Result<Self, SimError> {
        let mut sim = Self::from_params(params)?;
        sim.colliders.extend(open_box(half));

        let sph = Sph::try_new(params.sph.clone())?;
        let sph_id = sim.system.add_force(sph);
        sim.fluid = Some(sph_id);
        sim.spawn_fluid(block.particles(1.0, 1.0));

        Ok(sim)
    }

    /// Cloth sheet hanging from its first row.
    pub fn cloth_scene(params: &SimParams, builder: &ClothBuilder) -> Result<Self, SimError> {
        let mut sim = Self::from_params(params)?;
        let mut cloth = builder.build(&mut sim.system);
        cloth.pin_top_row(&sim.system);
        let range = cloth.particle_range();
        if let Some(gravity) = sim.system.force_mut(sim.gravity) {
            gravity.add_influenced_particles(range);
        }
        sim.cloth = Some(cloth);
        Ok(sim)
    }

    pub fn with_collider(mut self, collider: impl Into<Collider>) -> Self {
        self.colliders.push(collider.into());
        self
    }

    pub fn with_relax_iterations(mut self, iterations: usize) -> Self {
        self.relax_iterations = iterations;
        self
    }

    pub fn cloth(&self) -> Option<&Cloth> {
        self.cloth.as_ref()
    }

    pub fn cloth_mut(&mut self) -> Option<&mut Cloth> {
        self.cloth.as_mut()
    }

    /// Change the gravity acceleration.
    pub fn set_gravity(&mut self, gravity: DVec3) {
        if let Some(Force::ConstantAcceleration(force)) = self.system.force_mut(self.gravity) {
            force.acceleration = gravity;
        }
    }

    pub fn gravity(&self) -> DVec3 {
        match self.system.force(self.gravity) {
            Some(Force::ConstantAcceleration(force)) => force.acceleration,
            _ => DVec3::ZERO,
        }
    }

    /// Parameters of the SPH force, if the scene has one.
    pub fn sph_params(&self) -> Option<&SphParams> {
        match self.fluid.and_then(|id| self.system.force(id)) {
            Some(Force::Sph(sph)) => Some(sph.params()),
            _ => None,
        }
    }

    /// Replace the SPH parameters. No-op for scenes without fluid.
    pub fn set_sph_params(&mut self, params: SphParams) {
        if let Some(Force::Sph(sph)) = self.fluid.and_then(|id| self.system.force_mut(id)) {
            sph.set_params(params);
        }
    }

    /// Add particles affected by gravity only.
    pub fn spawn(
        &mut self,
        particles: impl IntoIterator<Item = Particle>,
    ) -> std::ops::Range<usize> {
        let range = self.system.add_particles(particles);
        if let Some(gravity) = self.system.force_mut(self.gravity) {
            gravity.add_influenced_particles(range.clone());
        }
        range
    }

    /// Add particles affected by gravity and, if present, the SPH force.
    pub fn spawn_fluid(
        &mut self,
        particles: impl IntoIterator<Item = Particle>,
    ) -> std::ops::Range<usize> {
        let range = self.spawn(particles);
        if let Some(sph) = self.fluid.and_then(|id| self.system.force_mut(id)) {
            sph.add_influenced_particles(range.clone());
        }
        range
    }

    /// Remove every particle and reset time and the step counter.
    ///
    /// Cloth springs are unregistered along with the cloth.
    pub fn reset(&mut self) {
        if let Some(cloth) = self.cloth.take() {
            for &id in cloth.springs() {
                self.system.remove_force(id);
            }
        }
        self.system.delete_particles();
        self.steps = 0;
    }

    /// Advance by `dt` and resolve collisions.
    pub fn tick(&mut self, dt: f64) -> TickStats {
        self.integrator.step(&mut self.system, dt);

        if let Some(cloth) = &self.cloth {
            cloth.enforce_pins(&mut self.system);
            cloth.relax(&mut self.system, self.relax_iterations);
        }

        let mut stats = TickStats::default();
        for particle in self.system.particles_mut() {
            for collider in &self.colliders {
                if collider.collide(particle, self.k_elastic, self.k_friction) {
                    stats.collisions += 1;
                }
            }
            stats.max_speed = stats.max_speed.max(particle.vel.length());
        }

        self.steps += 1;
        trace!(
            "tick {} t={:.4}: {} collisions, max speed {:.3}",
            self.steps,
            self.system.time(),
            stats.collisions,
            stats.max_speed
        );
        stats
    }
}

/// Floor at `y = 0` plus four inward-facing walls at `±half` on x and z.
pub fn open_box(half: f64) -> [Collider; 5] {
    use super::collider::PlaneCollider;
    [
        PlaneCollider::new(DVec3::Y, 0.0).into(),
        PlaneCollider::new(DVec3::X, half).into(),
        PlaneCollider::new(DVec3::NEG_X, half).into(),
        PlaneCollider::new(DVec3::Z, half).into(),
        PlaneCollider::new(DVec3::NEG_Z, half).into(),
    ]
}
