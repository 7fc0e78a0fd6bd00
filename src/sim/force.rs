//! Force definitions.
//!
//! Every force keeps a list of the particles it influences, stored as indices
//! into the owning [`ParticleSystem`](super::system::ParticleSystem). The list
//! is a working set only: clearing it never touches particle lifetime.
//!
//! Forces accumulate into [`Particle::force`]; several forces stack within one
//! evaluation, so `apply` must add and never overwrite.

use bevy::math::DVec3;

use super::particle::Particle;
use super::sph::Sph;

/// Uniform acceleration such as gravity: `F = m a`.
#[derive(Clone, Debug, Default)]
pub struct ConstantAcceleration {
    /// Acceleration applied to every influenced particle.
    pub acceleration: DVec3,
    particles: Vec<usize>,
}

impl ConstantAcceleration {
    pub fn new(acceleration: DVec3) -> Self {
        Self {
            acceleration,
            particles: Vec::new(),
        }
    }

    fn apply(&self, particles: &mut [Particle]) {
        for &i in &self.particles {
            let p = &mut particles[i];
            p.force += p.mass * self.acceleration;
        }
    }
}

/// Combined linear (Stokes) and quadratic drag.
#[derive(Clone, Debug, Default)]
pub struct Drag {
    /// Linear coefficient.
    pub k_linear: f64,
    /// Quadratic coefficient.
    pub k_quadratic: f64,
    particles: Vec<usize>,
}

impl Drag {
    pub fn new(k_linear: f64, k_quadratic: f64) -> Self {
        Self {
            k_linear,
            k_quadratic,
            particles: Vec::new(),
        }
    }

    fn apply(&self, particles: &mut [Particle]) {
        for &i in &self.particles {
            let p = &mut particles[i];
            p.force += -self.k_linear * p.vel;
            p.force += -self.k_quadratic * p.vel.length() * p.vel;
        }
    }
}

/// Damped Hookean spring between two particles.
///
/// The endpoints are the first two influenced particles; with fewer than two
/// the spring does nothing. Coincident endpoints produce NaN.
#[derive(Clone, Debug, Default)]
pub struct Spring {
    /// Spring constant (k_s).
    pub stiffness: f64,
    /// Damping coefficient (k_d), projected along the spring.
    pub damping: f64,
    /// Length at which the spring exerts no elastic force.
    pub rest_length: f64,
    particles: Vec<usize>,
}

impl Spring {
    pub fn new(p1: usize, p2: usize, stiffness: f64, damping: f64, rest_length: f64) -> Self {
        Self {
            stiffness,
            damping,
            rest_length,
            particles: vec![p1, p2],
        }
    }

    /// Rebind the spring to a new pair of particles.
    pub fn set_particle_pair(&mut self, p1: usize, p2: usize) {
        self.particles.clear();
        self.particles.extend([p1, p2]);
    }

    /// Endpoints, if the spring is bound.
    pub fn endpoints(&self) -> Option<(usize, usize)> {
        match self.particles.as_slice() {
            [a, b, ..] => Some((*a, *b)),
            _ => None,
        }
    }

    /// Force applied to the first endpoint; the second receives its negation.
    pub fn force_on_first(&self, p1: &Particle, p2: &Particle) -> DVec3 {
        let d = p2.pos - p1.pos;
        let len = d.length();
        let dir = d / len;
        let elastic = self.stiffness * (len - self.rest_length);
        let damping = self.damping * (p2.vel - p1.vel).dot(dir);
        (elastic + damping) * dir
    }

    fn apply(&self, particles: &mut [Particle]) {
        let Some((a, b)) = self.endpoints() else {
            return;
        };
        let f = self.force_on_first(&particles[a], &particles[b]);
        particles[a].force += f;
        particles[b].force -= f;
    }
}

/// Softened inverse-square attraction towards one attractor particle.
///
/// `F = G m_a m_j / |d|² · d̂ · (2 / (1 + exp(-a |d|² / b²)) - 1)`
///
/// The envelope vanishes at `d = 0` and saturates to 1 at long range.
#[derive(Clone, Debug)]
pub struct Gravitation {
    /// Index of the attracting particle.
    pub attractor: usize,
    /// Gravitational constant.
    pub constant: f64,
    /// Envelope steepness.
    pub a: f64,
    /// Envelope length scale.
    pub b: f64,
    particles: Vec<usize>,
}

impl Gravitation {
    pub fn new(attractor: usize, constant: f64, a: f64, b: f64) -> Self {
        Self {
            attractor,
            constant,
            a,
            b,
            particles: Vec::new(),
        }
    }

    /// Smooth saturation factor for a squared distance.
    #[inline]
    pub fn envelope(&self, dist_sq: f64) -> f64 {
        2.0 / (1.0 + (-self.a * dist_sq / (self.b * self.b)).exp()) - 1.0
    }

    fn apply(&self, particles: &mut [Particle]) {
        let attractor_pos = particles[self.attractor].pos;
        let attractor_mass = particles[self.attractor].mass;

        for &j in &self.particles {
            if j == self.attractor {
                continue;
            }
            let p = &mut particles[j];
            let d = attractor_pos - p.pos;
            let dist_sq = d.length_squared();
            let magnitude = self.constant * attractor_mass * p.mass / dist_sq;
            p.force += magnitude * (d / dist_sq.sqrt()) * self.envelope(dist_sq);
        }
    }
}

/// Every force kind the simulation supports.
#[derive(Clone, Debug)]
pub enum Force {
    ConstantAcceleration(ConstantAcceleration),
    Drag(Drag),
    Spring(Spring),
    Gravitation(Gravitation),
    Sph(Box<Sph>),
}

impl Force {
    /// Short name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Force::ConstantAcceleration(_) => "constant_acceleration",
            Force::Drag(_) => "drag",
            Force::Spring(_) => "spring",
            Force::Gravitation(_) => "gravitation",
            Force::Sph(_) => "sph",
        }
    }

    fn influence_mut(&mut self) -> &mut Vec<usize> {
        match self {
            Force::ConstantAcceleration(f) => &mut f.particles,
            Force::Drag(f) => &mut f.particles,
            Force::Spring(f) => &mut f.particles,
            Force::Gravitation(f) => &mut f.particles,
            Force::Sph(f) => f.influence_mut(),
        }
    }

    /// Particles this force acts on.
    pub fn influenced_particles(&self) -> &[usize] {
        match self {
            Force::ConstantAcceleration(f) => &f.particles,
            Force::Drag(f) => &f.particles,
            Force::Spring(f) => &f.particles,
            Force::Gravitation(f) => &f.particles,
            Force::Sph(f) => f.influenced_particles(),
        }
    }

    /// Add a particle to the working set.
    pub fn add_influenced_particle(&mut self, index: usize) {
        self.influence_mut().push(index);
    }

    /// Add a range of particles to the working set.
    pub fn add_influenced_particles(&mut self, indices: impl IntoIterator<Item = usize>) {
        self.influence_mut().extend(indices);
    }

    /// Empty the working set.
    pub fn clear_influenced_particles(&mut self) {
        self.influence_mut().clear();
    }

    /// Accumulate this force into the influenced particles.
    pub fn apply(&mut self, particles: &mut [Particle]) {
        match self {
            Force::ConstantAcceleration(f) => f.apply(particles),
            Force::Drag(f) => f.apply(particles),
            Force::Spring(f) => f.apply(particles),
            Force::Gravitation(f) => f.apply(particles),
            Force::Sph(f) => f.apply(particles),
        }
    }

    /// Re-map indices after particle `removed` left the system.
    ///
    /// Returns `false` when the force can no longer operate and should be
    /// dropped.
    pub fn forget_particle(&mut self, removed: usize) -> bool {
        let lost_endpoint = matches!(
            self,
            Force::Spring(s) if s.particles.iter().take(2).any(|&i| i == removed)
        );

        let list = self.influence_mut();
        list.retain(|&i| i != removed);
        for i in list.iter_mut() {
            if *i > removed {
                *i -= 1;
            }
        }

        if let Force::Gravitation(g) = self {
            if g.attractor == removed {
                return false;
            }
            if g.attractor > removed {
                g.attractor -= 1;
            }
        }

        !lost_endpoint
    }
}

impl From<ConstantAcceleration> for Force {
    fn from(f: ConstantAcceleration) -> Self {
        Force::ConstantAcceleration(f)
    }
}

impl From<Drag> for Force {
    fn from(f: Drag) -> Self {
        Force::Drag(f)
    }
}

impl From<Spring> for Force {
    fn from(f: Spring) -> Self {
        Force::Spring(f)
    }
}

impl From<Gravitation> for Force {
    fn from(f: Gravitation) -> Self {
        Force::Gravitation(f)
    }
}

impl From<Sph> for Force {
    fn from(f: Sph) -> Self {
        Force::Sph(Box::new(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(p1: DVec3, v1: DVec3, p2: DVec3, v2: DVec3) -> Vec<Particle> {
        let mut particles = vec![
            Particle::new(p1).with_velocity(v1),
            Particle::new(p2).with_velocity(v2),
        ];
        particles[1].id = 1;
        particles
    }

    #[test]
    fn test_constant_acceleration_scales_with_mass() {
        let mut particles = vec![Particle::new(DVec3::ZERO).with_mass(2.0)];
        let mut gravity: Force = ConstantAcceleration::new(DVec3::new(0.0, -9.81, 0.0)).into();
        gravity.add_influenced_particle(0);

        gravity.apply(&mut particles);
        assert_eq!(particles[0].force, DVec3::new(0.0, -19.62, 0.0));

        // Accumulates rather than overwrites
        gravity.apply(&mut particles);
        assert_eq!(particles[0].force, DVec3::new(0.0, -39.24, 0.0));
    }

    #[test]
    fn test_drag_opposes_velocity() {
        let mut particles =
            vec![Particle::new(DVec3::ZERO).with_velocity(DVec3::new(3.0, 4.0, 0.0))];
        let mut drag: Force = Drag::new(0.5, 0.1).into();
        drag.add_influenced_particle(0);
        drag.apply(&mut particles);

        // -0.5 v - 0.1 * 5 * v = -v
        let f = particles[0].force;
        assert!((f - DVec3::new(-3.0, -4.0, 0.0)).length() < 1e-12, "got {f}");
    }

    #[test]
    fn test_spring_forces_are_opposite() {
        let cases = [
            (DVec3::ZERO, DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), DVec3::ZERO),
            (
                DVec3::new(0.3, -1.0, 2.0),
                DVec3::new(1.0, 0.5, 0.0),
                DVec3::new(-0.7, 0.4, 1.1),
                DVec3::new(-2.0, 0.0, 3.0),
            ),
            (DVec3::ZERO, DVec3::ZERO, DVec3::new(0.0, 0.2, 0.0), DVec3::new(0.0, 1.0, 0.0)),
        ];

        for (p1, v1, p2, v2) in cases {
            let mut particles = pair(p1, v1, p2, v2);
            let mut spring: Force = Spring::new(0, 1, 30.0, 2.5, 1.0).into();
            spring.apply(&mut particles);
            assert_eq!(
                particles[0].force,
                -particles[1].force,
                "spring forces must be exact negatives"
            );
        }
    }

    #[test]
    fn test_spring_pulls_when_stretched() {
        let mut particles = pair(DVec3::ZERO, DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), DVec3::ZERO);
        let mut spring: Force = Spring::new(0, 1, 10.0, 0.0, 1.0).into();
        spring.apply(&mut particles);

        assert_eq!(particles[0].force, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(particles[1].force, DVec3::new(-10.0, 0.0, 0.0));
    }

    #[test]
    fn test_unbound_spring_is_noop() {
        let mut particles = vec![Particle::new(DVec3::ZERO)];
        let mut spring = Force::Spring(Spring::default());
        spring.add_influenced_particle(0);
        spring.apply(&mut particles);
        assert_eq!(particles[0].force, DVec3::ZERO);
    }

    #[test]
    fn test_gravitation_attracts_and_softens() {
        let mut particles = pair(
            DVec3::ZERO,
            DVec3::ZERO,
            DVec3::new(3.0, 0.0, 0.0),
            DVec3::ZERO,
        );
        let mut gravitation: Force = Gravitation::new(0, 1.0, 1.0, 1.0).into();
        gravitation.add_influenced_particles([0, 1]);
        gravitation.apply(&mut particles);

        // Attractor is never pulled by itself
        assert_eq!(particles[0].force, DVec3::ZERO);
        let f = particles[1].force;
        assert!(f.x < 0.0, "particle should be pulled towards the attractor, got {f}");
        let envelope = 2.0 / (1.0 + (-9.0f64).exp()) - 1.0;
        assert!((f.x + envelope / 9.0).abs() < 1e-12);

        let g = Gravitation::new(0, 1.0, 1.0, 1.0);
        assert_eq!(g.envelope(0.0), 0.0);
        assert!(g.envelope(1e6) > 0.999);
    }

    #[test]
    fn test_forget_particle_remaps_indices() {
        let mut gravity: Force = ConstantAcceleration::new(DVec3::NEG_Y).into();
        gravity.add_influenced_particles([0, 2, 5]);
        assert!(gravity.forget_particle(2));
        assert_eq!(gravity.influenced_particles(), &[0, 4]);

        let mut spring: Force = Spring::new(1, 3, 1.0, 0.0, 1.0).into();
        assert!(spring.forget_particle(0));
        assert_eq!(spring.influenced_particles(), &[0, 2]);
        assert!(!spring.forget_particle(2));

        let mut gravitation: Force = Gravitation::new(3, 1.0, 1.0, 1.0).into();
        gravitation.add_influenced_particles([0, 1]);
        assert!(gravitation.forget_particle(1));
        assert!(matches!(&gravitation, Force::Gravitation(g) if g.attractor == 2));
        assert!(!gravitation.forget_particle(2));
    }
}
