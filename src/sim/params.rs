//! Simulation parameters.
//!
//! These parameters control stepping, collision response and the SPH fluid
//! force. They can be modified at runtime through the Bevy resource system.

use bevy::math::DVec3;
use bevy::prelude::*;

use super::error::SimError;
use super::integrator::Integrator;

/// Parameters of the SPH fluid force and its spatial hash.
///
/// Defaults describe a coarse, water-like fluid at the scale the demo scene
/// uses (particles spaced roughly one unit apart).
#[derive(Clone, Debug, PartialEq, Reflect)]
pub struct SphParams {
    /// Smoothing kernel radius (h).
    /// Particle pairs farther apart than this exert no fluid force.
    pub smoothing_radius: f64,

    /// Rest density of the fluid.
    pub rest_density: f64,

    /// Stiffness of the ideal-gas equation of state.
    /// `pressure = gas_constant * (density - rest_density)`
    pub gas_constant: f64,

    /// Viscosity coefficient (μ) scaling the viscous force.
    pub viscosity: f64,

    /// Edge length of a spatial hash cell.
    /// Should be close to the smoothing radius for efficient queries.
    pub cell_spacing: f64,

    /// Upper bound on particle count.
    /// Sizes the hash table (twice this many buckets).
    pub max_particles: usize,
}

impl Default for SphParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 1.8,
            rest_density: 1.0,
            gas_constant: 20.0,
            viscosity: 0.5,
            cell_spacing: 1.8,
            max_particles: 4096,
        }
    }
}

impl SphParams {
    /// Creates parameters for a water-like fluid.
    pub fn water() -> Self {
        Self::default()
    }

    /// Creates parameters for a thick, honey-like fluid.
    pub fn honey() -> Self {
        Self {
            viscosity: 8.0,
            gas_constant: 10.0,
            ..Self::default()
        }
    }

    /// Set smoothing radius, keeping the hash cell size in step with it.
    pub fn with_smoothing_radius(mut self, h: f64) -> Self {
        self.smoothing_radius = h;
        self.cell_spacing = h;
        self
    }

    /// Set rest density.
    pub fn with_rest_density(mut self, rest_density: f64) -> Self {
        self.rest_density = rest_density;
        self
    }

    /// Set gas constant.
    pub fn with_gas_constant(mut self, gas_constant: f64) -> Self {
        self.gas_constant = gas_constant;
        self
    }

    /// Set viscosity.
    pub fn with_viscosity(mut self, viscosity: f64) -> Self {
        self.viscosity = viscosity;
        self
    }

    /// Set spatial hash cell spacing.
    pub fn with_cell_spacing(mut self, spacing: f64) -> Self {
        self.cell_spacing = spacing;
        self
    }

    /// Set maximum particle count.
    pub fn with_max_particles(mut self, max_particles: usize) -> Self {
        self.max_particles = max_particles;
        self
    }

    /// Poly6 normalisation: 315 / (64 π h⁹).
    pub fn poly6_coefficient(&self) -> f64 {
        315.0 / (64.0 * std::f64::consts::PI * self.smoothing_radius.powi(9))
    }

    /// Spiky gradient normalisation: 45 / (π h⁶).
    pub fn spiky_coefficient(&self) -> f64 {
        45.0 / (std::f64::consts::PI * self.smoothing_radius.powi(6))
    }

    /// Viscosity Laplacian normalisation: 45 / (π h⁶).
    pub fn viscosity_coefficient(&self) -> f64 {
        45.0 / (std::f64::consts::PI * self.smoothing_radius.powi(6))
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius > 0.0) {
            return Err(SimError::InvalidSmoothingRadius(self.smoothing_radius));
        }
        if !(self.cell_spacing.is_finite() && self.cell_spacing > 0.0) {
            return Err(SimError::InvalidCellSpacing(self.cell_spacing));
        }
        if self.max_particles == 0 {
            return Err(SimError::ZeroCapacity);
        }
        if !(self.rest_density > 0.0) {
            return Err(SimError::InvalidCoefficient {
                name: "rest_density",
                value: self.rest_density,
            });
        }
        if self.gas_constant < 0.0 {
            return Err(SimError::InvalidCoefficient {
                name: "gas_constant",
                value: self.gas_constant,
            });
        }
        if self.viscosity < 0.0 {
            return Err(SimError::InvalidCoefficient {
                name: "viscosity",
                value: self.viscosity,
            });
        }
        Ok(())
    }
}

/// Parameters controlling the simulation loop.
#[derive(Resource, Clone, Debug, Reflect)]
#[reflect(Resource)]
pub struct SimParams {
    /// Time integration scheme.
    pub integrator: Integrator,

    /// Timestep used per tick.
    /// Use None to use the fixed-update delta of the app.
    pub fixed_timestep: Option<f64>,

    /// Constant acceleration applied through a gravity force.
    pub gravity: DVec3,

    /// Restitution for collider response.
    /// 0.0 = particles stop on contact, 1.0 = perfectly elastic bounce.
    pub k_elastic: f64,

    /// Tangential damping for collider response.
    /// 0.0 = frictionless, 1.0 = tangential velocity removed.
    pub k_friction: f64,

    /// Fluid parameters.
    pub sph: SphParams,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            integrator: Integrator::SymplecticEuler,
            fixed_timestep: Some(0.01),
            gravity: DVec3::new(0.0, -9.81, 0.0),
            k_elastic: 0.5,
            k_friction: 0.0,
            sph: SphParams::default(),
        }
    }
}

impl SimParams {
    /// Parameters for the dam-break style fluid scene.
    pub fn fluid() -> Self {
        Self::default()
    }

    /// Parameters for a spring cloth: stiffer springs need a smaller step.
    pub fn cloth() -> Self {
        Self {
            fixed_timestep: Some(0.002),
            k_elastic: 0.1,
            k_friction: 0.2,
            ..Self::default()
        }
    }

    /// Set integrator.
    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// Set fixed timestep.
    pub fn with_timestep(mut self, dt: f64) -> Self {
        self.fixed_timestep = Some(dt);
        self
    }

    /// Set gravity.
    pub fn with_gravity(mut self, gravity: DVec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set collision response coefficients.
    pub fn with_response(mut self, k_elastic: f64, k_friction: f64) -> Self {
        self.k_elastic = k_elastic;
        self.k_friction = k_friction;
        self
    }

    /// Set fluid parameters.
    pub fn with_sph(mut self, sph: SphParams) -> Self {
        self.sph = sph;
        self
    }

    /// Check that every parameter is usable.
    pub fn validate(&self) -> Result<(), SimError> {
        if let Some(dt) = self.fixed_timestep {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(SimError::InvalidTimestep(dt));
            }
        }
        if !(0.0..=1.0).contains(&self.k_elastic) {
            return Err(SimError::InvalidCoefficient {
                name: "k_elastic",
                value: self.k_elastic,
            });
        }
        if !(0.0..=1.0).contains(&self.k_friction) {
            return Err(SimError::InvalidCoefficient {
                name: "k_friction",
                value: self.k_friction,
            });
        }
        self.sph.validate()
    }
}
