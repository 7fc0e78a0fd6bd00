//! Particle system: particle storage, force registry and state vectors.
//!
//! The system is the single owner of every [`Particle`]. Forces refer to
//! particles by index, so the invariant `particles[i].id == i` is maintained
//! across insertions and removals.
//!
//! Integrators see the system through flattened state vectors of length `2n`:
//! `[pos_0..pos_n, vel_0..vel_n]` for the state and
//! `[vel_0..vel_n, acc_0..acc_n]` for its time derivative.

use bevy::log::debug;
use bevy::math::DVec3;

use super::error::SimError;
use super::force::Force;
use super::particle::{GpuParticle, Particle};

/// Handle to a force registered in a [`ParticleSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForceId(u32);

/// Owns particles and the forces acting on them.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
    forces: Vec<(ForceId, Force)>,
    next_force_id: u32,
    time: f64,
    /// Set when particle state or topology changed since the last force update.
    forces_stale: bool,
}

impl ParticleSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a system with room for `capacity` particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    // --- particles ---

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Add a particle, returning its index.
    pub fn add_particle(&mut self, mut particle: Particle) -> usize {
        let id = self.particles.len();
        particle.id = id;
        self.particles.push(particle);
        self.forces_stale = true;
        id
    }

    /// Add several particles, returning the index range they occupy.
    pub fn add_particles(
        &mut self,
        particles: impl IntoIterator<Item = Particle>,
    ) -> std::ops::Range<usize> {
        let start = self.particles.len();
        for p in particles {
            self.add_particle(p);
        }
        start..self.particles.len()
    }

    /// Remove a particle, renumbering the ones after it.
    ///
    /// Forces are re-mapped to the new indices. A force that can no longer
    /// operate (a spring that lost an endpoint, a gravitation that lost its
    /// attractor) is removed from the system.
    pub fn remove_particle(&mut self, index: usize) -> Option<Particle> {
        if index >= self.particles.len() {
            return None;
        }

        let removed = self.particles.remove(index);
        for (i, p) in self.particles.iter_mut().enumerate().skip(index) {
            p.id = i;
        }

        self.forces.retain_mut(|(id, force)| {
            let keep = force.forget_particle(index);
            if !keep {
                debug!(
                    "dropping {} force {:?} after removing particle {}",
                    force.kind_name(),
                    id,
                    index
                );
            }
            keep
        });

        self.forces_stale = true;
        Some(removed)
    }

    /// Remove every particle and reset time.
    ///
    /// Forces stay registered with empty influence sets.
    pub fn delete_particles(&mut self) {
        self.particles.clear();
        for (_, force) in &mut self.forces {
            force.clear_influenced_particles();
        }
        self.time = 0.0;
        self.forces_stale = true;
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable access to every particle. Marks forces stale.
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        self.forces_stale = true;
        &mut self.particles
    }

    /// Particle at `index`. Panics when out of range.
    pub fn particle(&self, index: usize) -> &Particle {
        &self.particles[index]
    }

    /// Mutable particle at `index`. Panics when out of range. Marks forces stale.
    pub fn particle_mut(&mut self, index: usize) -> &mut Particle {
        self.forces_stale = true;
        &mut self.particles[index]
    }

    /// Checked particle access.
    pub fn try_particle(&self, index: usize) -> Result<&Particle, SimError> {
        self.particles.get(index).ok_or(SimError::ParticleOutOfRange {
            index,
            len: self.particles.len(),
        })
    }

    // --- forces ---

    /// Register a force, returning its handle.
    pub fn add_force(&mut self, force: impl Into<Force>) -> ForceId {
        let id = ForceId(self.next_force_id);
        self.next_force_id += 1;
        self.forces.push((id, force.into()));
        self.forces_stale = true;
        id
    }

    /// Unregister a force.
    pub fn remove_force(&mut self, id: ForceId) -> Option<Force> {
        let pos = self.forces.iter().position(|(fid, _)| *fid == id)?;
        self.forces_stale = true;
        Some(self.forces.remove(pos).1)
    }

    /// Unregister every force.
    pub fn clear_forces(&mut self) {
        self.forces.clear();
        self.forces_stale = true;
    }

    pub fn force(&self, id: ForceId) -> Option<&Force> {
        self.forces.iter().find(|(fid, _)| *fid == id).map(|(_, f)| f)
    }

    /// Mutable force access. Marks forces stale.
    pub fn force_mut(&mut self, id: ForceId) -> Option<&mut Force> {
        self.forces_stale = true;
        self.forces.iter_mut().find(|(fid, _)| *fid == id).map(|(_, f)| f)
    }

    /// Registered forces in application order.
    pub fn forces(&self) -> impl Iterator<Item = (ForceId, &Force)> {
        self.forces.iter().map(|(id, f)| (*id, f))
    }

    pub fn num_forces(&self) -> usize {
        self.forces.len()
    }

    /// Zero every force accumulator and apply each registered force once.
    pub fn update_forces(&mut self) {
        for p in &mut self.particles {
            p.force = DVec3::ZERO;
        }
        for (_, force) in &mut self.forces {
            force.apply(&mut self.particles);
        }
        self.forces_stale = false;
    }

    /// Update forces only if something changed since the last update.
    pub fn refresh_forces(&mut self) {
        if self.forces_stale {
            self.update_forces();
        }
    }

    pub fn forces_stale(&self) -> bool {
        self.forces_stale
    }

    // --- time ---

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    // --- state vectors ---

    /// Flattened state `[pos_0..pos_n, vel_0..vel_n]`.
    pub fn state(&self) -> Vec<DVec3> {
        let mut state = Vec::with_capacity(2 * self.particles.len());
        state.extend(self.particles.iter().map(|p| p.pos));
        state.extend(self.particles.iter().map(|p| p.vel));
        state
    }

    /// Write a flattened state. Panics if its length is not `2n`.
    pub fn set_state(&mut self, state: &[DVec3]) {
        let n = self.particles.len();
        assert_eq!(state.len(), 2 * n, "state length must be twice the particle count");
        let (positions, velocities) = state.split_at(n);
        for ((p, &pos), &vel) in self.particles.iter_mut().zip(positions).zip(velocities) {
            p.pos = pos;
            p.vel = vel;
        }
        self.forces_stale = true;
    }

    /// Time derivative of the state, `[vel_0..vel_n, acc_0..acc_n]`.
    ///
    /// Uses the accumulated forces as they currently stand.
    pub fn derivative(&self) -> Vec<DVec3> {
        let mut derivative = Vec::with_capacity(2 * self.particles.len());
        derivative.extend(self.particles.iter().map(|p| p.vel));
        derivative.extend(self.particles.iter().map(Particle::acceleration));
        derivative
    }

    pub fn positions(&self) -> Vec<DVec3> {
        self.particles.iter().map(|p| p.pos).collect()
    }

    pub fn set_positions(&mut self, positions: &[DVec3]) {
        for (p, &pos) in self.particles.iter_mut().zip(positions) {
            p.pos = pos;
        }
        self.forces_stale = true;
    }

    pub fn velocities(&self) -> Vec<DVec3> {
        self.particles.iter().map(|p| p.vel).collect()
    }

    pub fn set_velocities(&mut self, velocities: &[DVec3]) {
        for (p, &vel) in self.particles.iter_mut().zip(velocities) {
            p.vel = vel;
        }
        self.forces_stale = true;
    }

    pub fn previous_positions(&self) -> Vec<DVec3> {
        self.particles.iter().map(|p| p.prev_pos).collect()
    }

    pub fn set_previous_positions(&mut self, positions: &[DVec3]) {
        for (p, &pos) in self.particles.iter_mut().zip(positions) {
            p.prev_pos = pos;
        }
    }

    /// Per-particle `force / mass`.
    pub fn accelerations(&self) -> Vec<DVec3> {
        self.particles.iter().map(Particle::acceleration).collect()
    }

    /// Instance data for the renderer.
    pub fn gpu_instances(&self) -> Vec<GpuParticle> {
        self.particles.iter().map(GpuParticle::from).collect()
    }
}
