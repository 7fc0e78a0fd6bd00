//! Particula - particle simulation core for Bevy
//!
//! This library advances point masses under accumulated forces, resolves their
//! collisions with static geometry and computes SPH fluid forces, in double
//! precision on the CPU.
//!
//! # Features
//!
//! - **Six integrators**: Euler, symplectic Euler, midpoint, RK2, RK4 and Verlet
//! - **Forces**: Gravity, drag, damped springs, gravitation and SPH
//! - **Continuous collisions**: Swept tests against planes, spheres and boxes
//! - **Spatial hashing**: Counting-sort grid for neighbour queries
//! - **Cloth**: Stretch, shear and bend springs with pinned particles
//! - **Easy Integration**: Simple Bevy plugin interface
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use bevy::math::DVec3;
//! use bevy::prelude::*;
//! use particula::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(SimulationPlugin::with_params(SimParams::fluid()))
//!         .add_systems(Startup, setup)
//!         .run();
//! }
//!
//! fn setup(mut simulation: ResMut<Simulation>) {
//!     simulation.colliders.extend(open_box(5.0));
//!     let block = ParticleBlock::new([4, 4, 4], 1.0, DVec3::new(-2.0, 4.0, -2.0));
//!     simulation.spawn(block.particles(1.0, 0.5));
//! }
//! ```
//!
//! # Architecture
//!
//! - [`sim`]: Core simulation module
//!   - [`sim::system`]: Particles, forces and state vectors
//!   - [`sim::integrator`]: Time integration schemes
//!   - [`sim::collider`]: Collision detection and response
//!   - [`sim::sph`]: SPH fluid force
//!   - [`sim::plugin`]: Bevy plugin

pub mod sim;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::sim::prelude::*;
}
