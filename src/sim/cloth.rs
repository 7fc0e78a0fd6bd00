//! Mass-spring cloth.
//!
//! A rectangular sheet of `nx * ny` particles, row `i` hanging below row
//! `i - 1`, connected by three spring families:
//! - stretch: direct neighbours along both grid axes,
//! - shear: both diagonals of every quad,
//! - bend: neighbours two apart along both grid axes.
//!
//! [`Cloth::relax`] applies Provot's over-stretch correction after each step.

use bevy::math::DVec3;

use super::force::{Force, Spring};
use super::particle::Particle;
use super::system::{ForceId, ParticleSystem};

/// Cloth particle display color.
const CLOTH_COLOR: bevy::color::Color =
    bevy::color::Color::srgb(235.0 / 255.0, 51.0 / 255.0, 36.0 / 255.0);

/// Parameters for a new cloth sheet.
#[derive(Clone, Debug)]
pub struct ClothBuilder {
    /// Number of rows.
    pub nx: usize,
    /// Number of particles per row.
    pub ny: usize,
    /// Extent along a row.
    pub width: f64,
    /// Extent from the first row to the last.
    pub height: f64,
    /// Position of particle `(0, 0)`.
    pub origin: DVec3,
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    pub radius: f64,
}

impl Default for ClothBuilder {
    fn default() -> Self {
        Self {
            nx: 20,
            ny: 20,
            width: 40.0,
            height: 40.0,
            origin: DVec3::new(-20.0, 70.0, 0.0),
            stiffness: 500.0,
            damping: 5.0,
            mass: 1.0,
            radius: 0.5,
        }
    }
}

impl ClothBuilder {
    pub fn new(nx: usize, ny: usize, width: f64, height: f64) -> Self {
        Self {
            nx,
            ny,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_springs(mut self, stiffness: f64, damping: f64) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    /// Distance between rows.
    pub fn edge_x(&self) -> f64 {
        self.height / self.nx.saturating_sub(1).max(1) as f64
    }

    /// Distance between neighbours within a row.
    pub fn edge_y(&self) -> f64 {
        self.width / self.ny.saturating_sub(1).max(1) as f64
    }

    /// Add the sheet and its springs to `system`.
    pub fn build(&self, system: &mut ParticleSystem) -> Cloth {
        let (nx, ny) = (self.nx, self.ny);
        let (ex, ey) = (self.edge_x(), self.edge_y());

        let particles = (0..nx).flat_map(|i| {
            (0..ny).map(move |j| {
                Particle::new(self.origin + DVec3::new(j as f64 * ey, -(i as f64) * ex, 0.0))
                    .with_mass(self.mass)
                    .with_radius(self.radius)
                    .with_color(CLOTH_COLOR)
            })
        });
        let first = system.add_particles(particles).start;
        let idx = |i: usize, j: usize| first + i * ny + j;

        let diagonal = (ex * ex + ey * ey).sqrt();
        let mut pairs = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                if j + 1 < ny {
                    pairs.push((idx(i, j), idx(i, j + 1), ey));
                }
                if i + 1 < nx {
                    pairs.push((idx(i, j), idx(i + 1, j), ex));
                }
                if i + 1 < nx && j + 1 < ny {
                    pairs.push((idx(i, j), idx(i + 1, j + 1), diagonal));
                    pairs.push((idx(i, j + 1), idx(i + 1, j), diagonal));
                }
                if j + 2 < ny {
                    pairs.push((idx(i, j), idx(i, j + 2), 2.0 * ey));
                }
                if i + 2 < nx {
                    pairs.push((idx(i, j), idx(i + 2, j), 2.0 * ex));
                }
            }
        }

        let springs = pairs
            .into_iter()
            .map(|(a, b, rest)| {
                system.add_force(Spring::new(a, b, self.stiffness, self.damping, rest))
            })
            .collect();

        Cloth {
            first,
            nx,
            ny,
            springs,
            anchors: vec![None; nx * ny],
        }
    }
}

/// Handle to a cloth sheet inside a [`ParticleSystem`].
#[derive(Clone, Debug)]
pub struct Cloth {
    first: usize,
    nx: usize,
    ny: usize,
    springs: Vec<ForceId>,
    /// Anchor position of each pinned particle, by local index.
    anchors: Vec<Option<DVec3>>,
}

impl Cloth {
    /// System index of grid particle `(i, j)`.
    pub fn index(&self, i: usize, j: usize) -> usize {
        self.first + i * self.ny + j
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// System index range occupied by the sheet.
    pub fn particle_range(&self) -> std::ops::Range<usize> {
        self.first..self.first + self.len()
    }

    pub fn springs(&self) -> &[ForceId] {
        &self.springs
    }

    /// Pin grid particle `(i, j)` at its current position.
    pub fn pin(&mut self, system: &ParticleSystem, i: usize, j: usize) {
        let index = self.index(i, j);
        self.anchors[i * self.ny + j] = Some(system.particle(index).pos);
    }

    /// Pin the whole first row.
    pub fn pin_top_row(&mut self, system: &ParticleSystem) {
        for j in 0..self.ny {
            self.pin(system, 0, j);
        }
    }

    pub fn unpin_all(&mut self) {
        self.anchors.fill(None);
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.local(index)
            .is_some_and(|local| self.anchors[local].is_some())
    }

    fn local(&self, index: usize) -> Option<usize> {
        self.particle_range().contains(&index).then(|| index - self.first)
    }

    /// Update every cloth spring's coefficients.
    pub fn set_spring_coefficients(
        &self,
        system: &mut ParticleSystem,
        stiffness: f64,
        damping: f64,
    ) {
        for &id in &self.springs {
            if let Some(Force::Spring(spring)) = system.force_mut(id) {
                spring.stiffness = stiffness;
                spring.damping = damping;
            }
        }
    }

    /// Hold pinned particles at their anchors with zero velocity.
    pub fn enforce_pins(&self, system: &mut ParticleSystem) {
        let particles = system.particles_mut();
        for (local, anchor) in self.anchors.iter().enumerate() {
            if let Some(anchor) = anchor {
                let p = &mut particles[self.first + local];
                p.pos = *anchor;
                p.prev_pos = *anchor;
                p.vel = DVec3::ZERO;
                p.force = DVec3::ZERO;
            }
        }
    }

    /// Provot relaxation: shorten over-stretched springs back to rest length.
    ///
    /// Compressed springs are left alone. The correction is split between
    /// free endpoints; a pinned endpoint does not move.
    pub fn relax(&self, system: &mut ParticleSystem, iterations: usize) {
        let constraints: Vec<(usize, usize, f64)> = self
            .springs
            .iter()
            .filter_map(|&id| match system.force(id) {
                Some(Force::Spring(s)) => s.endpoints().map(|(a, b)| (a, b, s.rest_length)),
                _ => None,
            })
            .collect();

        for _ in 0..iterations {
            for &(a, b, rest) in &constraints {
                let (pinned_a, pinned_b) = (self.is_pinned(a), self.is_pinned(b));
                if pinned_a && pinned_b {
                    continue;
                }

                let particles = system.particles_mut();
                let d = particles[b].pos - particles[a].pos;
                let dist = d.length();
                if dist <= rest {
                    continue;
                }
                let correction = (dist - rest) * (d / dist);

                if pinned_b {
                    particles[a].pos += correction;
                } else if pinned_a {
                    particles[b].pos -= correction;
                } else {
                    particles[a].pos += 0.5 * correction;
                    particles[b].pos -= 0.5 * correction;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spring(system: &ParticleSystem, id: ForceId) -> &Spring {
        match system.force(id) {
            Some(Force::Spring(s)) => s,
            other => panic!("expected a spring, got {:?}", other),
        }
    }

    #[test]
    fn test_topology() {
        let mut system = ParticleSystem::new();
        let cloth = ClothBuilder::new(4, 5, 4.0, 3.0).build(&mut system);
        let (nx, ny) = (4, 5);

        let stretch = nx * (ny - 1) + (nx - 1) * ny;
        let shear = 2 * (nx - 1) * (ny - 1);
        let bend = nx * (ny - 2) + (nx - 2) * ny;
        assert_eq!(system.num_particles(), 20);
        assert_eq!(cloth.springs().len(), stretch + shear + bend);
        assert_eq!(system.num_forces(), cloth.springs().len());

        assert_eq!(system.particle(cloth.index(1, 2)).pos, DVec3::new(-18.0, 69.0, 0.0));
    }

    #[test]
    fn test_springs_start_at_rest() {
        let mut system = ParticleSystem::new();
        let cloth = ClothBuilder::new(3, 3, 2.0, 2.0).build(&mut system);
        for &id in cloth.springs() {
            let s = spring(&system, id);
            let (a, b) = s.endpoints().expect("cloth springs are bound");
            let len = (system.particle(b).pos - system.particle(a).pos).length();
            assert!((len - s.rest_length).abs() < 1e-12);
        }
        system.update_forces();
        for p in system.particles() {
            assert!(p.force.length() < 1e-9);
        }
    }

    #[test]
    fn test_offset_into_existing_system() {
        let mut system = ParticleSystem::new();
        system.add_particle(Particle::new(DVec3::ZERO));
        let cloth = ClothBuilder::new(2, 2, 1.0, 1.0).build(&mut system);
        assert_eq!(cloth.particle_range(), 1..5);
        assert_eq!(cloth.index(0, 0), 1);
        assert!(!cloth.is_pinned(0));
    }

    #[test]
    fn test_relax_shortens_stretched_spring() {
        let mut system = ParticleSystem::new();
        let mut cloth = ClothBuilder::new(2, 1, 1.0, 1.0).build(&mut system);
        cloth.pin(&system, 0, 0);
        let top = system.particle(0).pos;
        system.particle_mut(1).pos = top + DVec3::new(0.0, -3.0, 0.0);

        cloth.relax(&mut system, 1);

        assert_eq!(system.particle(0).pos, top);
        assert!((system.particle(1).pos - (top - DVec3::Y)).length() < 1e-12);
    }

    #[test]
    fn test_relax_splits_between_free_endpoints() {
        let mut system = ParticleSystem::new();
        let cloth = ClothBuilder::new(1, 2, 1.0, 1.0)
            .with_origin(DVec3::ZERO)
            .build(&mut system);
        system.particle_mut(1).pos = DVec3::new(3.0, 0.0, 0.0);
        cloth.relax(&mut system, 1);
        assert!((system.particle(0).pos.x - 1.0).abs() < 1e-12);
        assert!((system.particle(1).pos.x - 2.0).abs() < 1e-12);

        // compressed springs are untouched
        system.particle_mut(1).pos = DVec3::new(1.5, 0.0, 0.0);
        cloth.relax(&mut system, 1);
        assert_eq!(system.particle(1).pos.x, 1.5);
    }

    #[test]
    fn test_relax_skips_fully_pinned_spring() {
        let mut system = ParticleSystem::new();
        let mut cloth = ClothBuilder::new(1, 2, 1.0, 1.0).build(&mut system);
        system.particle_mut(1).pos.x += 5.0;
        cloth.pin(&system, 0, 0);
        cloth.pin(&system, 0, 1);
        let before = system.positions();
        cloth.relax(&mut system, 3);
        assert_eq!(system.positions(), before);
    }

    #[test]
    fn test_enforce_pins() {
        let mut system = ParticleSystem::new();
        let mut cloth = ClothBuilder::new(3, 3, 2.0, 2.0).build(&mut system);
        cloth.pin_top_row(&system);
        let anchor = system.particle(cloth.index(0, 1)).pos;

        let p = system.particle_mut(cloth.index(0, 1));
        p.pos += DVec3::ONE;
        p.vel = DVec3::X;
        cloth.enforce_pins(&mut system);

        let p = system.particle(cloth.index(0, 1));
        assert_eq!(p.pos, anchor);
        assert_eq!(p.vel, DVec3::ZERO);

        cloth.unpin_all();
        assert!(!cloth.is_pinned(cloth.index(0, 1)));
    }

    #[test]
    fn test_set_spring_coefficients() {
        let mut system = ParticleSystem::new();
        let cloth = ClothBuilder::new(3, 3, 2.0, 2.0).build(&mut system);
        cloth.set_spring_coefficients(&mut system, 42.0, 0.5);
        for &id in cloth.springs() {
            let s = spring(&system, id);
            assert_eq!((s.stiffness, s.damping), (42.0, 0.5));
        }
    }
}
