//! The AABB variant of the loose octree: indexes axis-aligned bounding boxes by location.
//!
//! `AabbOctree` owns the root node and is the only public entry point; `node` holds the
//! recursive engine that does the actual work.

mod node;

use std::hash::Hash;

use node::AabbNode;

use crate::error::OctreeError;
use crate::geom::{Aabb, BoxInfo, Plane, Ray, Sector, Vec3};
use crate::result::MoveOutcome;

pub use node::EntryFilter;

/// A dynamic, loose octree indexing `(key, bounds)` pairs.
///
/// `K` must be cheap to clone: a copy of every key lives in at least one `own_entries` map and
/// a further copy in the `child_entries` summary of every ancestor on the path to it.
pub struct AabbOctree<K> {
    root: Box<AabbNode<K>>,
    initial_size: f32,
    looseness: f32,
    min_node_size: f32,
}

impl<K> AabbOctree<K>
where
    K: Clone + Eq + Hash,
{
    /// `min_node_size` is clamped to `initial_size` (logging a warning) and `looseness` to
    /// `[1.0, 2.0]`. Fails only if `initial_size` is not positive.
    pub fn new(
        initial_size: f32,
        initial_centre: Vec3,
        min_node_size: f32,
        looseness: f32,
    ) -> Result<Self, OctreeError> {
        if initial_size <= 0. {
            return Err(OctreeError::InvalidSize);
        }
        let min_node_size = if min_node_size > initial_size {
            log::warn!(
                "AabbOctree::new: min_node_size ({min_node_size}) > initial_size \
                 ({initial_size}), clamping to initial_size"
            );
            initial_size
        } else {
            min_node_size
        };
        let looseness = looseness.clamp(1.0, 2.0);
        let info = BoxInfo::new(initial_centre, initial_size, looseness);
        Ok(Self {
            root: Box::new(AabbNode::new(info, looseness, min_node_size)),
            initial_size,
            looseness,
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

    /// Inserts `(key, bounds)`, growing the tree outward (doubling the root, up to 20 times)
    /// if the entry doesn't fit yet. Re-adding an existing key replaces its bounds and logs a
    /// warning rather than failing.
    pub fn add(&mut self, key: K, bounds: Aabb) -> bool {
        self.add_with_max_grow_attempts(key, bounds, 20)
    }

    /// `max_grow_attempts = 0` means "try once, never grow".
    pub fn add_with_max_grow_attempts(
        &mut self,
        key: K,
        bounds: Aabb,
        max_grow_attempts: u32,
    ) -> bool {
        if self.root.add(key.clone(), bounds) {
            return true;
        }
        for _ in 0..max_grow_attempts {
            self.grow(bounds.centre - self.root.info.centre);
            if self.root.add(key.clone(), bounds) {
                return true;
            }
        }
        log::error!(
            "AabbOctree::add: failed to fit entry after {max_grow_attempts} grow attempts"
        );
        false
    }

    /// Doubles the root, keeping it (and its subtree) as a single child of the new, bigger
    /// root. The new root is centred so that it extends further in `direction`; the old root
    /// therefore ends up opposite `direction` in the new child array.
    fn grow(&mut self, direction: Vec3) {
        let signs = direction.signum_nonneg();
        let old_info = self.root.info;
        let half = old_info.length / 2.;
        let new_info = BoxInfo::new(old_info.centre + signs * half, old_info.length * 2., self.looseness);

        let old_root = std::mem::replace(
            &mut self.root,
            Box::new(AabbNode::new(new_info, self.looseness, self.min_node_size)),
        );
        if old_root.count() > 0 {
            let old_sector = Sector::of_offset(signs).complement();
            self.root.adopt_single_child(old_sector, old_root);
        }
    }

    /// `merge_if_able = true` also attempts to shrink the root afterwards.
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

    /// Tries to relocate `key` to `new_bounds` without a full remove-then-add. Returns
    /// `MoveOutcome::None` if `key` isn't in the tree, `Moved` on success, `Removed` if the
    /// entry left the tree and could not be re-added at `new_bounds` even after growing.
    pub fn move_entry(&mut self, key: &K, new_bounds: Aabb) -> MoveOutcome {
        match self.root.move_entry(key, new_bounds, true) {
            MoveOutcome::Removed => {
                if self.add(key.clone(), new_bounds) {
                    MoveOutcome::Moved
                } else {
                    MoveOutcome::Removed
                }
            }
            other => other,
        }
    }

    /// `move_entry`, falling back to `add` when `key` wasn't present.
    pub fn add_or_move(&mut self, key: K, new_bounds: Aabb) -> bool {
        match self.move_entry(&key, new_bounds) {
            MoveOutcome::Moved => true,
            MoveOutcome::Removed => false,
            MoveOutcome::None => self.add(key, new_bounds),
        }
    }

    pub fn is_intersecting(&self, query: &Aabb, filter: EntryFilter<K>) -> bool {
        self.root.is_intersecting(query, filter)
    }

    pub fn get_intersecting(&self, query: &Aabb, filter: EntryFilter<K>) -> Vec<K> {
        let mut out = Vec::new();
        self.root.get_intersecting(query, filter, &mut out);
        out
    }

    /// The closest entry hit by `ray` within `max_distance`, if any.
    pub fn raycast(&self, ray: &Ray, max_distance: f32, filter: EntryFilter<K>) -> Option<(K, f32)> {
        let mut hits = Vec::new();
        self.root.raycast(ray, max_distance, filter, &mut hits);
        hits.into_iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    }

    /// Every entry hit by `ray` within `max_distance`, unordered.
    pub fn raycast_all(&self, ray: &Ray, max_distance: f32, filter: EntryFilter<K>, out: &mut Vec<(K, f32)>) {
        self.root.raycast(ray, max_distance, filter, out);
    }

    pub fn get_within_frustum(&self, planes: &[Plane], filter: EntryFilter<K>) -> Vec<K> {
        let mut out = Vec::new();
        self.root.get_within_frustum(planes, filter, &mut out);
        out
    }

    /// Returns the entry with the lowest `fitness` score across the whole tree. `node_filter`
    /// prunes traversal (return `false` to skip a subtree); `fitness` returning `None` means
    /// "ignore this entry".
    pub fn find_best_match<S: PartialOrd + Copy>(
        &self,
        fitness: &dyn Fn(&K, &Aabb) -> Option<S>,
        node_filter: &dyn Fn(&BoxInfo) -> bool,
        entry_filter: EntryFilter<K>,
    ) -> Option<(K, S)> {
        self.root.find_best_match(fitness, node_filter, entry_filter)
    }
}
