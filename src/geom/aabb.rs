use super::{Ray, Vec3};

/// An axis-aligned bounding box, stored as a centre and half-extents rather than min/max so
/// that cube construction (equal half-extents on every axis) is a single scalar.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub centre: Vec3,
    pub half_extents: Vec3,
}

impl Aabb {
    pub const fn new(centre: Vec3, half_extents: Vec3) -> Self {
        Self {
            centre,
            half_extents,
        }
    }

    /// A cube of the given side length, centred at `centre`.
    pub fn cube(centre: Vec3, length: f32) -> Self {
        Self {
            centre,
            half_extents: Vec3::splat(length / 2.),
        }
    }

    /// A degenerate box with zero extent, for treating a point as an AABB.
    pub fn point(p: Vec3) -> Self {
        Self {
            centre: p,
            half_extents: Vec3::ZERO,
        }
    }

    pub fn min(&self) -> Vec3 {
        self.centre - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.centre + self.half_extents
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        let min = self.min();
        let max = self.max();
        p.x >= min.x
            && p.x <= max.x
            && p.y >= min.y
            && p.y <= max.y
            && p.z >= min.z
            && p.z <= max.z
    }

    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        let a_min = self.min();
        let a_max = self.max();
        let b_min = other.min();
        let b_max = other.max();
        a_min.x <= b_max.x
            && a_max.x >= b_min.x
            && a_min.y <= b_max.y
            && a_max.y >= b_min.y
            && a_min.z <= b_max.z
            && a_max.z >= b_min.z
    }

    /// Slab-method ray/box intersection. Returns the distance to the nearest hit point along
    /// the ray, or `None` if the ray misses or the box is entirely behind the origin.
    ///
    /// See <https://gamedev.stackexchange.com/questions/18436/most-efficient-aabb-vs-ray-collision-algorithms>.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let min = self.min();
        let max = self.max();

        let t1 = (min.x - ray.origin.x) / ray.direction.x;
        let t2 = (max.x - ray.origin.x) / ray.direction.x;
        let t3 = (min.y - ray.origin.y) / ray.direction.y;
        let t4 = (max.y - ray.origin.y) / ray.direction.y;
        let t5 = (min.z - ray.origin.z) / ray.direction.z;
        let t6 = (max.z - ray.origin.z) / ray.direction.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        if tmax < 0. || tmin > tmax {
            return None;
        }

        Some(if tmin < 0. { 0. } else { tmin })
    }

    /// The closest point on (or in) this box to `p`.
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        let min = self.min();
        let max = self.max();
        Vec3::new(
            p.x.clamp(min.x, max.x),
            p.y.clamp(min.y, max.y),
            p.z.clamp(min.z, max.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_point_respects_boundary() {
        let b = Aabb::cube(Vec3::ZERO, 2.);
        assert!(b.contains_point(Vec3::new(1., 1., 1.)));
        assert!(!b.contains_point(Vec3::new(1.01, 0., 0.)));
    }

    #[test]
    fn intersects_aabb_overlap_and_disjoint() {
        let a = Aabb::cube(Vec3::ZERO, 2.);
        let b = Aabb::cube(Vec3::new(1.5, 0., 0.), 2.);
        let c = Aabb::cube(Vec3::new(10., 0., 0.), 2.);
        assert!(a.intersects_aabb(&b));
        assert!(!a.intersects_aabb(&c));
    }

    #[test]
    fn intersect_ray_hits_and_misses() {
        let b = Aabb::cube(Vec3::ZERO, 2.);
        let hit = Ray {
            origin: Vec3::new(-5., 0., 0.),
            direction: Vec3::new(1., 0., 0.),
        };
        assert_eq!(b.intersect_ray(&hit), Some(4.));

        let miss = Ray {
            origin: Vec3::new(-5., 5., 0.),
            direction: Vec3::new(1., 0., 0.),
        };
        assert_eq!(b.intersect_ray(&miss), None);
    }

    #[test]
    fn closest_point_clamps_to_surface() {
        let b = Aabb::cube(Vec3::ZERO, 2.);
        assert_eq!(b.closest_point(Vec3::new(5., 0., 0.)), Vec3::new(1., 0., 0.));
        assert_eq!(b.closest_point(Vec3::new(0.2, 0.2, 0.2)), Vec3::new(0.2, 0.2, 0.2));
    }
}
