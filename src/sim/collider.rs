//! Static collision geometry.
//!
//! Detection is continuous: each shape tests the segment a particle swept
//! during the last step, from `prev_pos` to `pos`. Every shape reduces a hit
//! to a contact plane ([`Collision`]) and shares a single response law,
//! [`resolve_collision`].

use bevy::math::DVec3;

use super::particle::Particle;

/// Contact point and outward unit normal of a detected crossing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collision {
    pub position: DVec3,
    pub normal: DVec3,
}

/// Reflect a particle through the contact plane of `collision`.
///
/// The normal velocity component is reversed and scaled by `k_elastic`, the
/// tangential one is scaled by `1 - k_friction`, and the penetration depth is
/// mirrored back through the plane scaled by `1 + k_elastic`.
pub fn resolve_collision(
    particle: &mut Particle,
    collision: &Collision,
    k_elastic: f64,
    k_friction: f64,
) {
    let n = collision.normal;
    let d = -n.dot(collision.position);

    let depth = n.dot(particle.pos) + d;
    particle.pos -= (1.0 + k_elastic) * depth * n;

    let vn = n.dot(particle.vel) * n;
    let vt = particle.vel - vn;
    particle.vel = -k_elastic * vn + (1.0 - k_friction) * vt;
}

/// Infinite plane `normal · x + d = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneCollider {
    /// Unit plane normal.
    pub normal: DVec3,
    pub d: f64,
}

impl PlaneCollider {
    /// Plane `normal · x + d = 0`. The equation is rescaled so that the
    /// stored normal has unit length.
    pub fn new(normal: DVec3, d: f64) -> Self {
        let len = normal.length();
        Self {
            normal: normal / len,
            d: d / len,
        }
    }

    /// Plane through `point` facing `normal`.
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance from the plane, positive on the normal side.
    #[inline]
    pub fn signed_distance(&self, pos: DVec3) -> f64 {
        self.normal.dot(pos) + self.d
    }

    /// Particle lies on or behind the plane.
    pub fn is_inside(&self, particle: &Particle) -> bool {
        self.signed_distance(particle.pos) <= 0.0
    }

    /// Crossing of the segment `prev_pos -> pos`, if any.
    ///
    /// A segment that starts on the plane and heads to the normal side is
    /// leaving the surface and is not a hit.
    pub fn test_collision(&self, particle: &Particle) -> Option<Collision> {
        let r = particle.pos - particle.prev_pos;
        let denom = self.normal.dot(r);
        if denom == 0.0 {
            return None;
        }

        let start = self.signed_distance(particle.prev_pos);
        if start == 0.0 && denom > 0.0 {
            return None;
        }

        let lambda = -start / denom;
        (0.0..=1.0).contains(&lambda).then(|| Collision {
            position: particle.prev_pos + lambda * r,
            normal: self.normal,
        })
    }
}

/// Solid sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereCollider {
    pub center: DVec3,
    pub radius: f64,
}

impl SphereCollider {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn is_inside(&self, particle: &Particle) -> bool {
        (particle.pos - self.center).length_squared() <= self.radius * self.radius
    }

    pub fn test_collision(&self, particle: &Particle) -> Option<Collision> {
        let p0 = particle.prev_pos;
        let v = particle.pos - p0;
        let oc = p0 - self.center;

        let a = v.dot(v);
        if a == 0.0 {
            return None;
        }
        let b = 2.0 * v.dot(oc);
        let c = oc.dot(oc) - self.radius * self.radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let mut lambda = (-b - sqrt_disc) / (2.0 * a);
        if lambda < 0.0 {
            lambda = (-b + sqrt_disc) / (2.0 * a);
        }
        if !(0.0..=1.0).contains(&lambda) {
            return None;
        }

        let position = p0 + lambda * v;
        Some(Collision {
            position,
            normal: (position - self.center).normalize(),
        })
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AabbCollider {
    pub min: DVec3,
    pub max: DVec3,
}

impl AabbCollider {
    /// Box spanned by two opposite corners, in any order.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
        let half = 0.5 * size.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn is_inside(&self, particle: &Particle) -> bool {
        let p = particle.pos;
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Slab test of the swept segment.
    ///
    /// A segment entering the box reports the entry face. A segment that
    /// starts inside reports the face it leaves through. A segment contained
    /// entirely in the box is not a crossing.
    pub fn test_collision(&self, particle: &Particle) -> Option<Collision> {
        let p0 = particle.prev_pos;
        let delta = particle.pos - p0;

        let mut t_back = f64::NEG_INFINITY;
        let mut t_front = f64::INFINITY;
        let mut back_axis = None;
        let mut front_axis = None;

        for axis in 0..3 {
            let (o, dir) = (p0[axis], delta[axis]);
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let (mut t_near, mut t_far) = ((lo - o) * inv, (hi - o) * inv);
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            if t_near > t_back {
                t_back = t_near;
                back_axis = Some(axis);
            }
            if t_far < t_front {
                t_front = t_far;
                front_axis = Some(axis);
            }
        }

        if t_back > t_front {
            return None;
        }

        let (t, axis, sign) = if t_back >= 0.0 {
            (t_back, back_axis?, -1.0)
        } else {
            (t_front, front_axis?, 1.0)
        };
        if !(0.0..=1.0).contains(&t) {
            return None;
        }

        let mut normal = DVec3::ZERO;
        normal[axis] = sign * delta[axis].signum();
        Some(Collision {
            position: p0 + t * delta,
            normal,
        })
    }
}

/// Any supported collision shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collider {
    Plane(PlaneCollider),
    Sphere(SphereCollider),
    Aabb(AabbCollider),
}

impl Collider {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Collider::Plane(_) => "plane",
            Collider::Sphere(_) => "sphere",
            Collider::Aabb(_) => "aabb",
        }
    }

    pub fn is_inside(&self, particle: &Particle) -> bool {
        match self {
            Collider::Plane(c) => c.is_inside(particle),
            Collider::Sphere(c) => c.is_inside(particle),
            Collider::Aabb(c) => c.is_inside(particle),
        }
    }

    pub fn test_collision(&self, particle: &Particle) -> Option<Collision> {
        match self {
            Collider::Plane(c) => c.test_collision(particle),
            Collider::Sphere(c) => c.test_collision(particle),
            Collider::Aabb(c) => c.test_collision(particle),
        }
    }

    /// Same response law for every shape.
    pub fn resolve_collision(
        &self,
        particle: &mut Particle,
        collision: &Collision,
        k_elastic: f64,
        k_friction: f64,
    ) {
        resolve_collision(particle, collision, k_elastic, k_friction);
    }

    /// Test and, on a hit, resolve. Returns whether a collision happened.
    pub fn collide(&self, particle: &mut Particle, k_elastic: f64, k_friction: f64) -> bool {
        match self.test_collision(particle) {
            Some(collision) => {
                self.resolve_collision(particle, &collision, k_elastic, k_friction);
                true
            }
            None => false,
        }
    }
}

impl From<PlaneCollider> for Collider {
    fn from(c: PlaneCollider) -> Self {
        Collider::Plane(c)
    }
}

impl From<SphereCollider> for Collider {
    fn from(c: SphereCollider) -> Self {
        Collider::Sphere(c)
    }
}

impl From<AabbCollider> for Collider {
    fn from(c: AabbCollider) -> Self {
        Collider::Aabb(c)
    }
}
