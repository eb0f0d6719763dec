use super::Vec3;

/// A ray, described by an origin and a direction.
///
/// The AABB slab test (`Aabb::intersect_ray`) works with an unnormalised direction; the
/// point-tree distance-to-ray radius search requires a normalised direction to return a
/// meaningful squared distance.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Squared perpendicular distance from `p` to the infinite line this ray lies on.
    /// Requires `direction` to be normalised; no clamping to the ray segment is performed.
    pub fn squared_distance_to_point(&self, p: Vec3) -> f32 {
        let to_point = p - self.origin;
        self.direction.cross(&to_point).squared_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_distance_to_point_on_line_is_zero() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1., 0., 0.));
        assert_eq!(ray.squared_distance_to_point(Vec3::new(5., 0., 0.)), 0.);
    }

    #[test]
    fn squared_distance_to_point_off_line() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(1., 0., 0.));
        assert_eq!(ray.squared_distance_to_point(Vec3::new(5., 3., 0.)), 9.);
    }
}
