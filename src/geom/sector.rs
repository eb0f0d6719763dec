use super::{Aabb, Vec3};

/// One of the eight octants around a node's centre, encoded as a three-bit mask:
/// bit 0 = +X, bit 1 = +Y, bit 2 = +Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sector(u8);

impl Sector {
    pub const COUNT: usize = 8;

    pub fn new(index: u8) -> Self {
        debug_assert!(index < 8);
        Sector(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The sector of a point `p` relative to centre `c`: the sign of each component of
    /// `p - c`, with the zero case treated as the negative side.
    pub fn of_offset(offset: Vec3) -> Sector {
        let mut bits = 0u8;
        if offset.x > 0. {
            bits |= 0b001;
        }
        if offset.y > 0. {
            bits |= 0b010;
        }
        if offset.z > 0. {
            bits |= 0b100;
        }
        Sector(bits)
    }

    /// Unit direction vector for this sector, components in {-1, +1}.
    pub fn direction(self) -> Vec3 {
        Vec3::new(
            if self.0 & 0b001 != 0 { 1. } else { -1. },
            if self.0 & 0b010 != 0 { 1. } else { -1. },
            if self.0 & 0b100 != 0 { 1. } else { -1. },
        )
    }

    pub fn all() -> [Sector; 8] {
        std::array::from_fn(|i| Sector(i as u8))
    }

    /// The sector diagonally opposite this one (every bit flipped). Used by `grow` to find
    /// the slot the old root occupies in the doubled tree: it sits opposite the direction
    /// the tree grew towards.
    pub fn complement(self) -> Sector {
        Sector((!self.0) & 0b111)
    }
}

/// Precomputed geometry for a node (or a prospective child): its centre, side length, and the
/// strict and loose cubes derived from them.
///
/// An entry **belongs** to a node when its centre lies in the strict cube (so each entry
/// belongs to at most one node at a given level) but is **admissible** as long as its extent
/// fits in the loose cube (the overlap slack that makes the octree "loose").
#[derive(Debug, Clone, Copy)]
pub struct BoxInfo {
    pub centre: Vec3,
    pub length: f32,
    pub strict_cube: Aabb,
    pub loose_cube: Aabb,
}

impl BoxInfo {
    pub fn new(centre: Vec3, length: f32, looseness: f32) -> Self {
        Self {
            centre,
            length,
            strict_cube: Aabb::cube(centre, length),
            loose_cube: Aabb::cube(centre, length * looseness),
        }
    }

    pub fn loose_encapsulates(&self, bounds: &Aabb) -> bool {
        self.loose_cube.contains_point(bounds.min()) && self.loose_cube.contains_point(bounds.max())
    }

    pub fn encapsulates(&self, bounds: &Aabb) -> bool {
        self.loose_encapsulates(bounds) && self.strict_cube.contains_point(bounds.centre)
    }

    /// The eight would-be children of a node with this geometry: centres offset by
    /// `length / 4` along each axis, half the length, looseness inherited from the parent.
    pub fn child_boxes(&self, looseness: f32) -> [BoxInfo; 8] {
        let child_length = self.length / 2.;
        let offset = self.length / 4.;
        Sector::all().map(|sector| {
            BoxInfo::new(self.centre + sector.direction() * offset, child_length, looseness)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_offset_treats_zero_as_negative() {
        assert_eq!(Sector::of_offset(Vec3::ZERO).index(), 0);
        assert_eq!(Sector::of_offset(Vec3::new(1., 1., 1.)).index(), 0b111);
        assert_eq!(Sector::of_offset(Vec3::new(1., -1., 0.)).index(), 0b001);
    }

    #[test]
    fn direction_matches_sign_bits() {
        assert_eq!(Sector::new(0).direction(), Vec3::new(-1., -1., -1.));
        assert_eq!(Sector::new(0b111).direction(), Vec3::new(1., 1., 1.));
        assert_eq!(Sector::new(0b001).direction(), Vec3::new(1., -1., -1.));
    }

    #[test]
    fn encapsulates_requires_strict_centre_and_loose_extent() {
        let info = BoxInfo::new(Vec3::ZERO, 4., 1.5);
        // centre inside strict cube, extent inside loose cube
        assert!(info.encapsulates(&Aabb::cube(Vec3::new(1., 0., 0.), 1.)));
        // centre outside strict cube (|1| + extents > 2) even though loose-encapsulated
        assert!(!info.encapsulates(&Aabb::cube(Vec3::new(2.5, 0., 0.), 1.)));
        // not even loose-encapsulated
        assert!(!info.encapsulates(&Aabb::cube(Vec3::new(10., 0., 0.), 1.)));
    }

    #[test]
    fn child_boxes_tile_the_parent_cube() {
        let info = BoxInfo::new(Vec3::ZERO, 4., 1.0);
        let children = info.child_boxes(1.0);
        for child in children.iter() {
            assert_eq!(child.length, 2.);
        }
        // the +++ child sits in the positive octant, half way out to the parent's corner.
        let ppp = children[0b111];
        assert_eq!(ppp.centre, Vec3::new(1., 1., 1.));
    }
}
