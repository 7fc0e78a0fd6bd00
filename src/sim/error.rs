//! Error types for simulation configuration.
//!
//! Numerical degeneracies (coincident spring endpoints, zero-length swept
//! segments, `dt == 0`) are not represented here: they propagate through the
//! simulation as non-finite floats. Only configuration that can be checked up
//! front is reported as a [`SimError`].

use thiserror::Error;

/// Errors raised while validating simulation parameters or indexing particles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Fixed timestep is not a positive finite number.
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    /// SPH smoothing radius is not a positive finite number.
    #[error("smoothing radius must be positive and finite, got {0}")]
    InvalidSmoothingRadius(f64),

    /// Spatial hash cell spacing is not a positive finite number.
    #[error("cell spacing must be positive and finite, got {0}")]
    InvalidCellSpacing(f64),

    /// Spatial hash was configured for zero particles.
    #[error("spatial hash capacity must be at least one particle")]
    ZeroCapacity,

    /// A physical coefficient lies outside its valid range.
    #[error("coefficient `{name}` out of range: {value}")]
    InvalidCoefficient {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Particle index is not below the particle count.
    #[error("particle index {index} out of range for {len} particles")]
    ParticleOutOfRange {
        /// Requested index.
        index: usize,
        /// Current particle count.
        len: usize,
    },
}
