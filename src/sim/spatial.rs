//! Spatial hashing for neighbour search.
//!
//! A uniform grid of `spacing`-sized cells is hashed into `2 * max_particles`
//! buckets. The table is built with a counting sort: per-bucket occupancy is
//! counted into `grid`, prefix-summed into bucket start offsets, and particle
//! indices are scattered into `cells`. Bucket `h` then owns the contiguous
//! range `cells[grid[h]..grid[h + 1]]`, with no per-cell allocation.
//!
//! Distinct cells may share a bucket. Queries are therefore conservative:
//! callers must apply an exact distance test to every candidate.

use bevy::log::{debug, warn};
use bevy::math::DVec3;

use super::particle::Particle;

/// Large odd primes for hash mixing.
const P1: i64 = 73_856_093;
const P2: i64 = 19_349_663;
const P3: i64 = 83_492_791;

/// Query buffer reservation per particle of capacity.
const QUERY_RESERVE_FACTOR: usize = 10;

/// Uniform-grid spatial hash over particle positions.
#[derive(Clone, Debug)]
pub struct SpatialHash {
    /// Edge length of a grid cell.
    spacing: f64,
    /// Upper bound on the number of indexed particles.
    capacity: usize,
    /// Number of hash buckets.
    size: usize,
    /// Bucket start offsets into `cells`, `size + 1` entries.
    grid: Vec<usize>,
    /// Particle indices grouped by bucket.
    cells: Vec<usize>,
    /// Result buffer of the last query.
    particle_ids: Vec<usize>,
    /// Number of valid entries in `particle_ids`.
    query_size: usize,
}

impl SpatialHash {
    /// Create a hash with the given cell spacing for up to `max_particles`.
    pub fn new(spacing: f64, max_particles: usize) -> Self {
        let size = 2 * max_particles.max(1);
        Self {
            spacing,
            capacity: max_particles,
            size,
            grid: vec![0; size + 1],
            cells: Vec::with_capacity(max_particles),
            particle_ids: Vec::with_capacity(QUERY_RESERVE_FACTOR * max_particles),
            query_size: 0,
        }
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Change the cell spacing. The table must be rebuilt afterwards.
    pub fn set_spacing(&mut self, spacing: f64) {
        self.spacing = spacing;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize for a new particle bound. The table must be rebuilt afterwards.
    pub fn set_capacity(&mut self, max_particles: usize) {
        self.capacity = max_particles;
        self.size = 2 * max_particles.max(1);
        self.grid.clear();
        self.grid.resize(self.size + 1, 0);
        self.cells.clear();
        self.cells.reserve(max_particles);
        self.particle_ids.clear();
        self.particle_ids.reserve(QUERY_RESERVE_FACTOR * max_particles);
        self.query_size = 0;
    }

    /// Number of hash buckets.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of particles indexed by the last build.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the last build indexed nothing.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Hash integer cell coordinates into a bucket index.
    #[inline]
    pub fn hash_coordinates(&self, x: i64, y: i64, z: i64) -> usize {
        let h = x.wrapping_mul(P1) ^ y.wrapping_mul(P2) ^ z.wrapping_mul(P3);
        (h.unsigned_abs() % self.size as u64) as usize
    }

    /// Integer cell coordinates of a position.
    #[inline]
    pub fn int_coordinates(&self, pos: DVec3) -> [i64; 3] {
        [
            (pos.x / self.spacing).floor() as i64,
            (pos.y / self.spacing).floor() as i64,
            (pos.z / self.spacing).floor() as i64,
        ]
    }

    /// Bucket index of a position.
    #[inline]
    pub fn hash_position(&self, pos: DVec3) -> usize {
        let [x, y, z] = self.int_coordinates(pos);
        self.hash_coordinates(x, y, z)
    }

    /// Rebuild the table for the first `n` particles.
    ///
    /// At most `capacity` particles are indexed; the rest are ignored.
    pub fn create(&mut self, particles: &[Particle], n: usize) {
        let requested = n.min(particles.len());
        let count = requested.min(self.capacity);
        if count < requested {
            warn!(
                "spatial hash capacity {} exceeded, ignoring {} particles",
                self.capacity,
                requested - count
            );
        }

        self.grid.clear();
        self.grid.resize(self.size + 1, 0);
        self.cells.clear();
        self.cells.resize(count, 0);

        for p in &particles[..count] {
            let h = self.hash_position(p.pos);
            self.grid[h] += 1;
        }

        let mut start = 0;
        for slot in &mut self.grid[..self.size] {
            start += *slot;
            *slot = start;
        }
        self.grid[self.size] = start;

        for (i, p) in particles[..count].iter().enumerate() {
            let h = self.hash_position(p.pos);
            self.grid[h] -= 1;
            self.cells[self.grid[h]] = i;
        }

        debug!("spatial hash rebuilt: {} particles in {} buckets", count, self.size);
    }

    /// Particle indices stored in bucket `h`.
    #[inline]
    pub fn bucket(&self, h: usize) -> &[usize] {
        &self.cells[self.grid[h]..self.grid[h + 1]]
    }

    /// Collect candidates inside the cube of half-size `max_dist` around
    /// particle `nr`.
    ///
    /// Every particle within `max_dist` is returned. Farther particles may be
    /// returned too, and a particle may appear more than once when two
    /// covered cells share a bucket.
    pub fn query(&mut self, particles: &[Particle], nr: usize, max_dist: f64) -> &[usize] {
        self.query_position(particles[nr].pos, max_dist)
    }

    /// Same as [`query`](Self::query) around an arbitrary position.
    pub fn query_position(&mut self, pos: DVec3, max_dist: f64) -> &[usize] {
        let [x0, y0, z0] = self.int_coordinates(pos - DVec3::splat(max_dist));
        let [x1, y1, z1] = self.int_coordinates(pos + DVec3::splat(max_dist));

        self.particle_ids.clear();
        for xi in x0..=x1 {
            for yi in y0..=y1 {
                for zi in z0..=z1 {
                    let h = self.hash_coordinates(xi, yi, zi);
                    let (start, end) = (self.grid[h], self.grid[h + 1]);
                    self.particle_ids.extend_from_slice(&self.cells[start..end]);
                }
            }
        }
        self.query_size = self.particle_ids.len();

        &self.particle_ids
    }

    /// Number of candidates returned by the last query.
    pub fn query_size(&self) -> usize {
        self.query_size
    }

    /// Result of the last query.
    pub fn query_ids(&self) -> &[usize] {
        &self.particle_ids[..self.query_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn particles_at(positions: &[DVec3]) -> Vec<Particle> {
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

    #[test]
    fn test_int_coordinates_floor() {
        let hash = SpatialHash::new(2.0, 16);
        assert_eq!(hash.int_coordinates(DVec3::new(0.5, 3.9, 4.0)), [0, 1, 2]);
        assert_eq!(hash.int_coordinates(DVec3::new(-0.1, -2.0, -2.1)), [-1, -1, -2]);
    }

    #[test]
    fn test_hash_in_range() {
        let hash = SpatialHash::new(1.0, 10);
        for x in -50..50 {
            for y in [-1_000_000, -3, 0, 7, 1_000_000] {
                let h = hash.hash_coordinates(x, y, x * y);
                assert!(h < hash.size());
            }
        }
    }

    #[test]
    fn test_create_counting_sort() {
        let particles = particles_at(&[
            DVec3::new(0.1, 0.1, 0.1),
            DVec3::new(5.5, 0.1, 0.1),
            DVec3::new(0.2, 0.3, 0.4),
            DVec3::new(-3.0, 2.0, 1.0),
        ]);
        let mut hash = SpatialHash::new(1.0, 8);
        hash.create(&particles, particles.len());

        assert_eq!(hash.len(), 4);
        assert_eq!(hash.grid[hash.size()], 4);
        assert!(hash.grid.windows(2).all(|w| w[0] <= w[1]), "offsets must be monotonic");

        let bucket = hash.bucket(hash.hash_position(particles[0].pos));
        assert!(bucket.contains(&0));
        assert!(bucket.contains(&2));

        let mut all: Vec<usize> = (0..hash.size()).flat_map(|h| hash.bucket(h).to_vec()).collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_create_respects_capacity() {
        let particles = particles_at(&[DVec3::ZERO, DVec3::ONE, DVec3::splat(2.0)]);
        let mut hash = SpatialHash::new(1.0, 2);
        hash.create(&particles, 3);
        assert_eq!(hash.len(), 2);
    }

    #[test]
    fn test_rebuild_reuses_buffers() {
        let particles = particles_at(&[DVec3::ZERO, DVec3::ONE]);
        let mut hash = SpatialHash::new(1.0, 64);
        hash.create(&particles, 2);
        let cells_ptr = hash.cells.as_ptr();
        let grid_ptr = hash.grid.as_ptr();
        hash.create(&particles, 2);
        assert_eq!(cells_ptr, hash.cells.as_ptr());
        assert_eq!(grid_ptr, hash.grid.as_ptr());
    }

    #[test]
    fn test_query_has_no_false_negatives() {
        let mut rng = StdRng::seed_from_u64(7);
        let positions: Vec<DVec3> = (0..400)
            .map(|_| {
                DVec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                )
            })
            .collect();
        let particles = particles_at(&positions);

        let mut hash = SpatialHash::new(1.5, 400);
        hash.create(&particles, particles.len());

        for r in [0.5, 1.5, 2.7] {
            for i in (0..particles.len()).step_by(13) {
                let candidates = hash.query(&particles, i, r).to_vec();
                assert_eq!(hash.query_size(), candidates.len());
                for (j, p) in particles.iter().enumerate() {
                    if (p.pos - particles[i].pos).length() <= r {
                        assert!(
                            candidates.contains(&j),
                            "particle {} within {} of {} missing from query",
                            j,
                            r,
                            i
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_query_includes_upper_cells() {
        // Neighbour sits in the cell above the query cube's lower corner cell
        let particles = particles_at(&[DVec3::new(0.9, 0.9, 0.9), DVec3::new(1.2, 1.2, 1.2)]);
        let mut hash = SpatialHash::new(1.0, 4);
        hash.create(&particles, 2);
        assert!(hash.query(&particles, 0, 0.5).contains(&1));
        assert!(hash.query(&particles, 1, 0.5).contains(&0));
    }
}
