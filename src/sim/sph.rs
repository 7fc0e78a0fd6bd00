//! Smoothed-particle hydrodynamics force.
//!
//! Implements the classic Müller et al. (2003) formulation: densities from the
//! poly6 kernel, pressure from an ideal-gas equation of state, a symmetrised
//! pressure force using the spiky kernel gradient, and a viscosity force using
//! the viscosity kernel Laplacian. Neighbours come from a [`SpatialHash`]
//! rebuilt on every evaluation.

use bevy::math::DVec3;

use super::error::SimError;
use super::params::SphParams;
use super::particle::Particle;
use super::spatial::SpatialHash;

/// SPH kernel functions.
pub struct SphKernels;

impl SphKernels {
    /// Poly6 kernel for density estimation.
    /// W(r, h) = (315 / 64πh⁹) * (h² - r²)³ for r < h
    #[inline]
    pub fn poly6(r_sq: f64, h: f64) -> f64 {
        let coefficient = 315.0 / (64.0 * std::f64::consts::PI * h.powi(9));
        Self::poly6_with_coeff(r_sq, h, coefficient)
    }

    /// Poly6 kernel with precomputed coefficient.
    #[inline]
    pub fn poly6_with_coeff(r_sq: f64, h: f64, coeff: f64) -> f64 {
        let h_sq = h * h;
        if r_sq >= h_sq {
            return 0.0;
        }
        let diff = h_sq - r_sq;
        coeff * diff * diff * diff
    }

    /// Negated spiky kernel gradient for a separation `r = x_j - x_i`.
    ///
    /// Points from the neighbour towards the subject particle:
    /// `-r / |r| * (45 / πh⁶) * (h - |r|)²`. Zero beyond `h` and at `r = 0`.
    #[inline]
    pub fn spiky(r: DVec3, h: f64) -> DVec3 {
        let r_len = r.length();
        if r_len > h || r_len <= 0.0 {
            return DVec3::ZERO;
        }
        let diff = h - r_len;
        -r * 45.0 / (std::f64::consts::PI * h.powi(6) * r_len) * diff * diff
    }

    /// Laplacian of the viscosity kernel.
    /// ∇²W(r, h) = (45 / πh⁶) * (h - |r|) for r ≤ h
    #[inline]
    pub fn visco(r_len: f64, h: f64) -> f64 {
        if r_len > h {
            return 0.0;
        }
        45.0 / (std::f64::consts::PI * h.powi(6)) * (h - r_len)
    }
}

/// SPH fluid force over its influenced particles.
///
/// Every system particle is indexed by the spatial hash, but only influenced
/// (fluid) particles receive fluid forces or contribute as neighbours.
#[derive(Clone, Debug)]
pub struct Sph {
    params: SphParams,
    hash: SpatialHash,
    particles: Vec<usize>,
    /// Per-system-particle fluid flag, rebuilt on each evaluation.
    fluid: Vec<bool>,
    /// Neighbour scratch for the particle being processed.
    neighbours: Vec<usize>,
}

impl Sph {
    /// Create the force with a hash sized by `params`.
    pub fn new(params: SphParams) -> Self {
        let hash = SpatialHash::new(params.cell_spacing, params.max_particles);
        Self {
            params,
            hash,
            particles: Vec::new(),
            fluid: Vec::new(),
            neighbours: Vec::with_capacity(64),
        }
    }

    /// Create the force after validating `params`.
    pub fn try_new(params: SphParams) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self::new(params))
    }

    pub fn params(&self) -> &SphParams {
        &self.params
    }

    /// Replace the parameters, resizing the hash if its shape changed.
    pub fn set_params(&mut self, params: SphParams) {
        if params.max_particles != self.hash.capacity() {
            self.hash.set_capacity(params.max_particles);
        }
        self.hash.set_spacing(params.cell_spacing);
        self.params = params;
    }

    pub fn hash(&self) -> &SpatialHash {
        &self.hash
    }

    /// Rebuild the spatial hash from the current particle positions.
    ///
    /// Call after any bulk change of particle count.
    pub fn rebuild(&mut self, particles: &[Particle]) {
        self.hash.create(particles, particles.len());
    }

    pub(crate) fn influenced_particles(&self) -> &[usize] {
        &self.particles
    }

    pub(crate) fn influence_mut(&mut self) -> &mut Vec<usize> {
        &mut self.particles
    }

    /// Compute densities and pressures, then accumulate fluid forces.
    pub fn apply(&mut self, particles: &mut [Particle]) {
        if self.particles.is_empty() {
            return;
        }

        self.fluid.clear();
        self.fluid.resize(particles.len(), false);
        for &i in &self.particles {
            self.fluid[i] = true;
        }

        self.rebuild(particles);
        self.compute_density_pressure(particles);
        self.accumulate_forces(particles);
    }

    /// Density and pressure pass.
    fn compute_density_pressure(&mut self, particles: &mut [Particle]) {
        let h = self.params.smoothing_radius;
        let poly6_coeff = self.params.poly6_coefficient();

        for idx in 0..self.particles.len() {
            let i = self.particles[idx];
            gather_neighbours(&mut self.hash, &self.fluid, particles, i, h, &mut self.neighbours);

            let pos_i = particles[i].pos;
            let mut density = 0.0;
            for &j in &self.neighbours {
                let r_sq = (particles[j].pos - pos_i).length_squared();
                density += particles[j].mass * SphKernels::poly6_with_coeff(r_sq, h, poly6_coeff);
            }

            let p = &mut particles[i];
            p.density = density;
            p.pressure = self.params.gas_constant * (density - self.params.rest_density);
        }
    }

    /// Pressure and viscosity pass. Densities must be current.
    fn accumulate_forces(&mut self, particles: &mut [Particle]) {
        let h = self.params.smoothing_radius;
        let viscosity = self.params.viscosity;

        for idx in 0..self.particles.len() {
            let i = self.particles[idx];
            gather_neighbours(&mut self.hash, &self.fluid, particles, i, h, &mut self.neighbours);

            let pi = &particles[i];
            let rho_i = pi.density;
            let frac_i = pi.pressure / (rho_i * rho_i);

            let mut a_p = DVec3::ZERO;
            let mut a_v = DVec3::ZERO;

            for &j in &self.neighbours {
                if j == i {
                    continue;
                }
                let pj = &particles[j];
                let r = pj.pos - pi.pos;
                if r.length() > h {
                    continue;
                }

                let rho_j = pj.density;
                let frac_j = pj.pressure / (rho_j * rho_j);
                a_p += pj.mass * (frac_i + frac_j) * SphKernels::spiky(r, h);

                let v_ij = viscosity * pj.mass * (pj.vel - pi.vel) / (rho_i * rho_j);
                a_v += v_ij * SphKernels::visco(r.length(), h);
            }

            let pi = &mut particles[i];
            pi.force += pi.mass * (a_p + a_v);
        }
    }
}

/// Fluid particles within `h` of particle `i`, de-duplicated, `i` included.
fn gather_neighbours(
    hash: &mut SpatialHash,
    fluid: &[bool],
    particles: &[Particle],
    i: usize,
    h: f64,
    out: &mut Vec<usize>,
) {
    let pos_i = particles[i].pos;
    let h_sq = h * h;

    out.clear();
    out.extend(
        hash.query(particles, i, h)
            .iter()
            .copied()
            .filter(|&j| fluid[j] && (particles[j].pos - pos_i).length_squared() < h_sq),
    );
    out.sort_unstable();
    out.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn system(positions: &[DVec3]) -> Vec<Particle> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| {
                let mut p = Particle::new(pos);
                p.id = i;
                p
            })
            .collect()
    }

    fn fluid(params: SphParams, n: usize) -> Sph {
        let mut sph = Sph::new(params);
        sph.influence_mut().extend(0..n);
        sph
    }

    #[test]
    fn test_poly6_kernel() {
        let h = 1.0;
        let w_0 = SphKernels::poly6(0.0, h);
        assert!(w_0 > 0.0);
        assert_eq!(SphKernels::poly6(h * h, h), 0.0);
        assert_eq!(SphKernels::poly6(2.0, h), 0.0);

        let w_half = SphKernels::poly6(0.25, h);
        assert!(w_half < w_0 && w_half > 0.0);
    }

    #[test]
    fn test_spiky_points_away_from_neighbour() {
        let h = 1.0;
        let grad = SphKernels::spiky(DVec3::new(0.5, 0.0, 0.0), h);
        assert!(grad.x < 0.0, "expected push away from neighbour, got {grad}");
        assert_eq!(grad.y, 0.0);

        assert_eq!(SphKernels::spiky(DVec3::ZERO, h), DVec3::ZERO);
        assert_eq!(SphKernels::spiky(DVec3::new(1.5, 0.0, 0.0), h), DVec3::ZERO);
        assert!(SphKernels::spiky(DVec3::new(h, 0.0, 0.0), h).length() < 1e-12);
    }

    #[test]
    fn test_visco_cutoff() {
        let h = 2.0;
        assert!(SphKernels::visco(0.0, h) > SphKernels::visco(1.0, h));
        assert_eq!(SphKernels::visco(h, h), 0.0);
        assert_eq!(SphKernels::visco(2.5, h), 0.0);

        let params = SphParams::default().with_smoothing_radius(h);
        assert!((SphKernels::visco(0.0, h) - params.viscosity_coefficient() * h).abs() < 1e-12);
        let grad = SphKernels::spiky(DVec3::new(0.0, 0.0, 1.0), h);
        assert!((grad.length() - params.spiky_coefficient()).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_particle_density() {
        let params = SphParams::default();
        let mut particles = system(&[DVec3::ZERO]);
        particles[0].mass = 2.0;
        let mut sph = fluid(params.clone(), 1);
        sph.apply(&mut particles);

        let h = params.smoothing_radius;
        let expected = 2.0 * params.poly6_coefficient() * h.powi(6);
        assert!((particles[0].density - expected).abs() < 1e-12);
        assert!(
            (particles[0].pressure - params.gas_constant * (expected - params.rest_density)).abs()
                < 1e-12
        );
        assert_eq!(particles[0].force, DVec3::ZERO);
    }

    #[test]
    fn test_density_matches_all_pairs() {
        let params = SphParams::default().with_smoothing_radius(1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let positions: Vec<DVec3> = (0..200)
            .map(|_| {
                DVec3::new(
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                )
            })
            .collect();
        let mut particles = system(&positions);
        let mut sph = fluid(params.clone(), particles.len());
        sph.apply(&mut particles);

        for p in &particles {
            let expected: f64 = positions
                .iter()
                .map(|q| SphKernels::poly6((*q - p.pos).length_squared(), 1.0))
                .sum();
            assert!(
                (p.density - expected).abs() < 1e-9,
                "particle {} density {} expected {}",
                p.id,
                p.density,
                expected
            );
        }
    }

    #[test]
    fn test_pressure_repels() {
        let params = SphParams::default().with_rest_density(0.01).with_viscosity(0.0);
        let mut particles = system(&[DVec3::ZERO, DVec3::new(0.5, 0.0, 0.0)]);
        let mut sph = fluid(params, 2);
        sph.apply(&mut particles);

        assert!(particles[0].pressure > 0.0);
        assert!(particles[0].force.x < 0.0, "got {}", particles[0].force);
        assert!(particles[1].force.x > 0.0, "got {}", particles[1].force);
        assert!((particles[0].force + particles[1].force).length() < 1e-12);
    }

    #[test]
    fn test_pressure_uses_each_neighbours_state() {
        let params = SphParams::default().with_rest_density(0.01).with_viscosity(0.0);
        let h = params.smoothing_radius;
        let mut particles = system(&[DVec3::ZERO, DVec3::new(0.0, 0.7, 0.0)]);
        particles[0].mass = 1.0;
        particles[1].mass = 3.0;
        let mut sph = fluid(params.clone(), 2);
        sph.apply(&mut particles);

        let w0 = SphKernels::poly6(0.0, h);
        let w = SphKernels::poly6(0.49, h);
        let rho_0 = 1.0 * w0 + 3.0 * w;
        let rho_1 = 3.0 * w0 + 1.0 * w;
        assert!((particles[0].density - rho_0).abs() < 1e-12);
        assert!((particles[1].density - rho_1).abs() < 1e-12);

        let p_0 = params.gas_constant * (rho_0 - params.rest_density);
        let p_1 = params.gas_constant * (rho_1 - params.rest_density);
        let grad = SphKernels::spiky(DVec3::new(0.0, 0.7, 0.0), h);
        let expected = 1.0 * 3.0 * (p_0 / (rho_0 * rho_0) + p_1 / (rho_1 * rho_1)) * grad;

        assert!(
            (particles[0].force - expected).length() < 1e-9,
            "got {}, expected {}",
            particles[0].force,
            expected
        );
    }

    #[test]
    fn test_viscosity_damps_relative_velocity() {
        let params = SphParams::default()
            .with_gas_constant(0.0)
            .with_viscosity(1.0);
        let mut particles = system(&[DVec3::ZERO, DVec3::new(0.5, 0.0, 0.0)]);
        particles[0].vel = DVec3::new(0.0, 1.0, 0.0);
        particles[1].vel = DVec3::new(0.0, -1.0, 0.0);
        let mut sph = fluid(params, 2);
        sph.apply(&mut particles);

        assert!(particles[0].force.y < 0.0);
        assert!(particles[1].force.y > 0.0);
        assert_eq!(particles[0].force.x, 0.0);
    }

    #[test]
    fn test_non_fluid_particles_untouched() {
        let params = SphParams::default().with_rest_density(0.01);
        let mut particles = system(&[DVec3::ZERO, DVec3::new(0.5, 0.0, 0.0)]);
        let mut sph = Sph::new(params);
        sph.influence_mut().push(0);
        sph.apply(&mut particles);

        assert_eq!(particles[1].density, 0.0);
        assert_eq!(particles[1].force, DVec3::ZERO);
        // The lone fluid particle has no fluid neighbours
        assert_eq!(particles[0].force, DVec3::ZERO);
    }

    #[test]
    fn test_try_new_validates() {
        let bad = SphParams::default().with_smoothing_radius(-1.0);
        assert!(matches!(Sph::try_new(bad), Err(SimError::InvalidSmoothingRadius(_))));
    }
}
