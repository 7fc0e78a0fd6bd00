//! Particle simulation core for Bevy.
//!
//! Point masses advance through time under accumulated forces, are swept
//! against static colliders after every step, and may interact as an SPH
//! fluid through a uniform-grid spatial hash.
//!
//! # Architecture
//!
//! - [`params`]: Simulation and SPH parameters
//! - [`particle`]: Particle data, block spawning and GPU instance layout
//! - [`system`]: Particle storage, force registry and state vectors
//! - [`force`]: Gravity, drag, springs and gravitation
//! - [`spatial`]: Spatial hashing for neighbour search
//! - [`sph`]: Smoothed-particle hydrodynamics force
//! - [`integrator`]: Euler, symplectic Euler, midpoint, RK2, RK4 and Verlet
//! - [`collider`]: Swept plane, sphere and box collisions
//! - [`cloth`]: Mass-spring cloth with Provot relaxation
//! - [`simulation`]: Per-tick integrate-then-collide driver
//! - [`plugin`]: Bevy plugin for easy integration
//!
//! # Example
//!
//! ```rust,no_run
//! use bevy::math::DVec3;
//! use particula::sim::prelude::*;
//!
//! let params = SimParams::fluid();
//! let block = ParticleBlock::new([8, 8, 8], 1.0, DVec3::new(-4.0, 5.0, -4.0)).with_jitter(0.5, 7);
//! let mut sim = Simulation::fluid_scene(&params, &block, 10.0).expect("valid parameters");
//! for _ in 0..100 {
//!     sim.tick(0.01);
//! }
//! ```

pub mod error;
pub mod params;
pub mod particle;
pub mod system;
pub mod force;
pub mod spatial;
pub mod sph;
pub mod integrator;
pub mod collider;
pub mod cloth;
pub mod simulation;
pub mod plugin;

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::error::*;
    pub use super::params::*;
    pub use super::particle::*;
    pub use super::system::*;
    pub use super::force::*;
    pub use super::spatial::*;
    pub use super::sph::*;
    pub use super::integrator::*;
    pub use super::collider::*;
    pub use super::cloth::*;
    pub use super::simulation::*;
    pub use super::plugin::*;
}
