use super::{Aabb, Vec3};

/// A half-space boundary: points `p` with `normal.dot(p) + distance >= 0` are "inside".
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from `p` to the plane, positive on the inside half-space.
    fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(&p) + self.distance
    }
}

/// Tests whether `box` is at least partially inside the intersection of the given half-spaces
/// (typically the six faces of a view frustum). Uses the AABB's "positive vertex" (the corner
/// furthest along each plane's normal) so a box is only rejected when it lies entirely outside
/// a single plane.
pub fn intersects_aabb(planes: &[Plane], bounds: &Aabb) -> bool {
    let min = bounds.min();
    let max = bounds.max();
    for plane in planes {
        let positive_vertex = Vec3::new(
            if plane.normal.x >= 0. { max.x } else { min.x },
            if plane.normal.y >= 0. { max.y } else { min.y },
            if plane.normal.z >= 0. { max.z } else { min.z },
        );
        if plane.signed_distance(positive_vertex) < 0. {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_frustum(half_extent: f32) -> Vec<Plane> {
        vec![
            Plane::new(Vec3::new(1., 0., 0.), half_extent),
            Plane::new(Vec3::new(-1., 0., 0.), half_extent),
            Plane::new(Vec3::new(0., 1., 0.), half_extent),
            Plane::new(Vec3::new(0., -1., 0.), half_extent),
            Plane::new(Vec3::new(0., 0., 1.), half_extent),
            Plane::new(Vec3::new(0., 0., -1.), half_extent),
        ]
    }

    #[test]
    fn box_inside_frustum_intersects() {
        let planes = cube_frustum(10.);
        let bounds = Aabb::cube(Vec3::ZERO, 2.);
        assert!(intersects_aabb(&planes, &bounds));
    }

    #[test]
    fn box_outside_frustum_does_not_intersect() {
        let planes = cube_frustum(10.);
        let bounds = Aabb::cube(Vec3::new(100., 0., 0.), 2.);
        assert!(!intersects_aabb(&planes, &bounds));
    }

    #[test]
    fn box_straddling_frustum_boundary_intersects() {
        let planes = cube_frustum(10.);
        let bounds = Aabb::cube(Vec3::new(10., 0., 0.), 4.);
        assert!(intersects_aabb(&planes, &bounds));
    }
}
