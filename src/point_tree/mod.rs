//! The point variant of the loose octree: indexes bare 3D points by location.
//!
//! Looseness is fixed at 1.0 (no admissibility slack is needed for zero-extent entries); see
//! `node` for the recursive engine, shared in spirit with the AABB variant's.

mod node;

use std::hash::Hash;

use node::PointNode;

use crate::error::OctreeError;
use crate::geom::{Aabb, BoxInfo, Ray, Sector, Vec3};
use crate::result::MoveOutcome;

pub use node::EntryFilter;

const POINT_LOOSENESS: f32 = 1.0;

/// A dynamic, loose octree indexing `(key, position)` pairs.
pub struct PointOctree<K> {
    root: Box<PointNode<K>>,
    initial_size: f32,
    min_node_size: f32,
}

impl<K> PointOctree<K>
where
    K: Clone + Eq + Hash,
{
    /// `min_node_size` is clamped to `initial_size` (logging a warning). Fails only if
    /// `initial_size` is not positive.
    pub fn new(initial_size: f32, initial_centre: Vec3, min_node_size: f32) -> Result<Self, OctreeError> {
        if initial_size <= 0. {
            return Err(OctreeError::InvalidSize);
        }
        let min_node_size = if min_node_size > initial_size {
            log::warn!(
                "PointOctree::new: min_node_size ({min_node_size}) > initial_size \
                 ({initial_size}), clamping to initial_size"
            );
            initial_size
        } else {
            min_node_size
        };
        let info = BoxInfo::new(initial_centre, initial_size, POINT_LOOSENESS);
        Ok(Self {
            root: Box::new(PointNode::new(info, min_node_size)),
            initial_size,
            min_node_size,
        })
    }

    pub fn contains(&self, key: &K) -> bool {
        self.root.contains(key)
    }

    pub fn count(&self) -> usize {
        self.root.count()
    }

    pub fn bounds(&self) -> Aabb {
        self.root.info.strict_cube
    }

    pub fn loose_bounds(&self) -> Aabb {
        self.root.info.loose_cube
    }

    pub fn get_all(&self) -> Vec<K> {
        self.root.all_keys()
    }

    pub fn add(&mut self, key: K, point: Vec3) -> bool {
        self.add_with_max_grow_attempts(key, point, 20)
    }

    pub fn add_with_max_grow_attempts(&mut self, key: K, point: Vec3, max_grow_attempts: u32) -> bool {
        if self.root.add(key.clone(), point) {
            return true;
        }
        for _ in 0..max_grow_attempts {
            self.grow(point - self.root.info.centre);
            if self.root.add(key.clone(), point) {
                return true;
            }
        }
        log::error!(
            "PointOctree::add: failed to fit entry after {max_grow_attempts} grow attempts"
        );
        false
    }

    fn grow(&mut self, direction: Vec3) {
        let signs = direction.signum_nonneg();
        let old_info = self.root.info;
        let half = old_info.length / 2.;
        let new_info = BoxInfo::new(old_info.centre + signs * half, old_info.length * 2., POINT_LOOSENESS);

        let old_root = std::mem::replace(
            &mut self.root,
            Box::new(PointNode::new(new_info, self.min_node_size)),
        );
        if old_root.count() > 0 {
            let old_sector = Sector::of_offset(signs).complement();
            self.root.adopt_single_child(old_sector, old_root);
        }
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.remove_with_merge(key, true)
    }

    pub fn remove_with_merge(&mut self, key: &K, merge_if_able: bool) -> bool {
        let removed = self.root.remove(key, true, merge_if_able);
        if removed && merge_if_able {
            self.root.shrink_if_possible(self.initial_size);
        }
        removed
    }

    pub fn move_entry(&mut self, key: &K, new_point: Vec3) -> MoveOutcome {
        match self.root.move_entry(key, new_point, true) {
            MoveOutcome::Removed => {
                if self.add(key.clone(), new_point) {
                    MoveOutcome::Moved
                } else {
                    MoveOutcome::Removed
                }
            }
            other => other,
        }
    }

    pub fn add_or_move(&mut self, key: K, new_point: Vec3) -> bool {
        match self.move_entry(&key, new_point) {
            MoveOutcome::Moved => true,
            MoveOutcome::Removed => false,
            MoveOutcome::None => self.add(key, new_point),
        }
    }

    /// Every point within `max_distance` of `centre` (Euclidean, compared in squared space).
    pub fn get_nearby(&self, centre: Vec3, max_distance: f32, filter: EntryFilter<K>) -> Vec<K> {
        self.get_nearby_with_distances(centre, max_distance, filter)
            .into_iter()
            .map(|(k, _, _)| k)
            .collect()
    }

    pub fn get_nearby_with_distances(
        &self,
        centre: Vec3,
        max_distance: f32,
        filter: EntryFilter<K>,
    ) -> Vec<(K, Vec3, f32)> {
        let mut out = Vec::new();
        self.root.get_nearby_point(centre, max_distance, filter, &mut out);
        out
    }

    /// Every point within `max_distance` of the infinite line `ray` lies on. `ray.direction`
    /// must be normalised, and no clamping to the ray segment is performed.
    pub fn get_nearby_ray(&self, ray: &Ray, max_distance: f32, filter: EntryFilter<K>) -> Vec<K> {
        self.get_nearby_ray_with_distances(ray, max_distance, filter)
            .into_iter()
            .map(|(k, _, _)| k)
            .collect()
    }

    pub fn get_nearby_ray_with_distances(
        &self,
        ray: &Ray,
        max_distance: f32,
        filter: EntryFilter<K>,
    ) -> Vec<(K, Vec3, f32)> {
        let mut out = Vec::new();
        self.root.get_nearby_ray(ray, max_distance, filter, &mut out);
        out
    }

    pub fn find_best_match<S: PartialOrd + Copy>(
        &self,
        fitness: &dyn Fn(&K, &Vec3) -> Option<S>,
        node_filter: &dyn Fn(&BoxInfo) -> bool,
        entry_filter: EntryFilter<K>,
    ) -> Option<(K, S)> {
        self.root.find_best_match(fitness, node_filter, entry_filter)
    }

    /// Convenience helper (optional per the crate's external-interface boundary): the closest
    /// point to `from` that lies roughly along `direction`, within `max_distance`. A host
    /// embedding this crate in an engine would normally derive `from`/`direction` from its own
    /// camera/viewport types and convert at the boundary; this crate has no camera type of its
    /// own to offer one, so the caller supplies the ray directly.
    pub fn find_closest_in_direction(
        &self,
        from: Vec3,
        direction: Vec3,
        max_distance: f32,
        entry_filter: EntryFilter<K>,
    ) -> Option<(K, f32)> {
        let direction = direction.normalized();
        let node_filter = |info: &BoxInfo| {
            info.loose_cube
                .intersect_ray(&Ray::new(from, direction))
                .is_some_and(|d| d <= max_distance)
        };
        let fitness = |_k: &K, p: &Vec3| {
            let to_point = *p - from;
            let dist = to_point.length();
            if dist > max_distance || dist <= 0. {
                return None;
            }
            let alignment = to_point.dot(&direction) / dist;
            if alignment <= 0. {
                return None;
            }
            Some(dist / alignment)
        };
        self.find_best_match(&fitness, &node_filter, entry_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(initial_size: f32, min_node_size: f32) -> PointOctree<u32> {
        PointOctree::new(initial_size, Vec3::ZERO, min_node_size).unwrap()
    }

    #[test]
    fn new_rejects_nonpositive_size() {
        assert_eq!(
            PointOctree::<u32>::new(0., Vec3::ZERO, 1.0).unwrap_err(),
            OctreeError::InvalidSize
        );
    }

    #[test]
    fn get_nearby_matches_linear_scan_over_random_points() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut t = tree(10., 0.5);
        let mut points = Vec::new();
        for i in 0..1000u32 {
            let p = Vec3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            );
            assert!(t.add(i, p));
            points.push(p);
        }

        let mut expected: Vec<u32> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| (**p - Vec3::ZERO).squared_length() <= 1.0)
            .map(|(i, _)| i as u32)
            .collect();
        let mut got = t.get_nearby(Vec3::ZERO, 1.0, None);
        expected.sort();
        got.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn move_relocates_point() {
        let mut t = tree(16., 0.1);
        t.add(1, Vec3::new(1., 1., 1.));
        assert_eq!(
            t.move_entry(&1, Vec3::new(-1., -1., -1.)),
            MoveOutcome::Moved
        );
        assert!(t.get_nearby(Vec3::new(-1., -1., -1.), 0.1, None).contains(&1));
        assert!(t.get_nearby(Vec3::new(1., 1., 1.), 0.1, None).is_empty());
    }

    #[test]
    fn remove_all_shrinks_back_to_empty_leaf() {
        let mut t = tree(16., 0.1);
        for i in 0..9u32 {
            t.add(i, Vec3::new(1., 1., 1.));
        }
        for i in 0..9u32 {
            assert!(t.remove(&i));
        }
        assert_eq!(t.count(), 0);
        assert!(t.root.children.is_none());
    }
}
