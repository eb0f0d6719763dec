use std::collections::HashMap;
use std::hash::Hash;

use crate::geom::{Aabb, BoxInfo, Plane, Sector};
use crate::result::MoveOutcome;

/// Per-node capacity threshold: a leaf splits once it holds more than this many entries (and
/// merges back once it holds at most this many). Using the same threshold for both directions
/// means split/merge hysteresis is zero; callers chasing thrash can raise `MAX_NODE_ENTRIES`.
pub(crate) const MAX_NODE_ENTRIES: usize = 8;

pub type EntryFilter<'a, K> = Option<&'a dyn Fn(&K, &Aabb) -> bool>;

/// A node of the AABB loose octree. Owns every entry and child stored anywhere in its
/// subtree; a node becomes unreachable (and is dropped) the moment its parent stops pointing
/// to it, whether through `merge` or through `shrink_if_possible` replacing the root.
pub(crate) struct AabbNode<K> {
    pub(crate) info: BoxInfo,
    pub(crate) own_entries: HashMap<K, Aabb>,
    pub(crate) child_entries: HashMap<K, Sector>,
    pub(crate) children: Option<Box<[Option<Box<AabbNode<K>>>; 8]>>,
    pub(crate) child_boxes: [BoxInfo; 8],
    looseness: f32,
    min_node_size: f32,
}

impl<K> AabbNode<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new(info: BoxInfo, looseness: f32, min_node_size: f32) -> Self {
        let child_boxes = info.child_boxes(looseness);
        Self {
            info,
            own_entries: HashMap::new(),
            child_entries: HashMap::new(),
            children: None,
            child_boxes,
            looseness,
            min_node_size,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.own_entries.len() + self.child_entries.len()
    }

    /// Every key stored anywhere in this subtree.
    pub(crate) fn all_keys(&self) -> Vec<K> {
        let mut out: Vec<K> = self.own_entries.keys().cloned().collect();
        out.extend(self.child_entries.keys().cloned());
        out
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.own_entries.contains_key(key) || self.child_entries.contains_key(key)
    }

    /// Adopts `child` as the sole materialised child at `sector`, rebuilding `child_entries`
    /// to summarise everything that now lives below. Used by `grow` to re-parent the old
    /// root under a freshly doubled one.
    pub(crate) fn adopt_single_child(&mut self, sector: Sector, child: Box<AabbNode<K>>) {
        let keys = child.all_keys();
        let mut children: Box<[Option<Box<AabbNode<K>>>; 8]> = Box::new(Default::default());
        children[sector.index()] = Some(child);
        self.children = Some(children);
        self.child_entries.clear();
        for k in keys {
            self.child_entries.insert(k, sector);
        }
    }

    fn child_mut_or_insert(&mut self, sector: Sector) -> &mut AabbNode<K> {
        let children = self
            .children
            .get_or_insert_with(|| Box::new(Default::default()));
        let slot = &mut children[sector.index()];
        if slot.is_none() {
            *slot = Some(Box::new(AabbNode::new(
                self.child_boxes[sector.index()],
                self.looseness,
                self.min_node_size,
            )));
        }
        slot.as_mut().unwrap()
    }

    /// Entry point for a top-level `add` (only ever called on the root by the facade).
    /// Rejects geometry the node's loose cube cannot admit at all; otherwise replaces any
    /// existing entry under `key` (logging a warning, since that indicates a duplicate add)
    /// and inserts via `nocheck_add`.
    pub(crate) fn add(&mut self, key: K, bounds: Aabb) -> bool {
        if !self.info.loose_encapsulates(&bounds) {
            return false;
        }
        if self.remove(&key, true, true) {
            log::warn!("add: key already present in tree, replacing with new bounds");
        }
        self.nocheck_add(key, bounds);
        true
    }

    /// Recursive insertion once the caller has already established the entry belongs
    /// somewhere in this subtree. This is the operation that makes the tree *loose*: an entry
    /// straddling the midplane of a node is kept at that node rather than forced into a child.
    pub(crate) fn nocheck_add(&mut self, key: K, bounds: Aabb) {
        if self.children.is_none() {
            let child_length = self.info.length / 2.;
            if self.count() < MAX_NODE_ENTRIES || child_length < self.min_node_size {
                self.own_entries.insert(key, bounds);
                return;
            }
            self.split();
        }

        let sector = Sector::of_offset(bounds.centre - self.info.centre);
        if !self.child_boxes[sector.index()].encapsulates(&bounds) {
            self.own_entries.insert(key, bounds);
            return;
        }

        self.child_entries.insert(key.clone(), sector);
        self.child_mut_or_insert(sector).nocheck_add(key, bounds);
    }

    fn split(&mut self) {
        if self.children.is_none() {
            self.children = Some(Box::new(Default::default()));
        }
        let entries: Vec<(K, Aabb)> = self.own_entries.drain().collect();
        for (key, bounds) in entries {
            let sector = Sector::of_offset(bounds.centre - self.info.centre);
            if self.child_boxes[sector.index()].encapsulates(&bounds) {
                self.child_entries.insert(key.clone(), sector);
                self.child_mut_or_insert(sector).nocheck_add(key, bounds);
            } else {
                self.own_entries.insert(key, bounds);
            }
        }
    }

    fn should_merge(&self) -> bool {
        self.children.is_some() && self.count() <= MAX_NODE_ENTRIES
    }

    fn merge(&mut self) {
        if let Some(children) = self.children.take() {
            for mut child in (*children).into_iter().flatten() {
                child.merge();
                for (k, b) in child.own_entries.drain() {
                    self.own_entries.insert(k, b);
                }
            }
        }
        self.child_entries.clear();
    }

    pub(crate) fn remove(&mut self, key: &K, is_root: bool, merge_if_able: bool) -> bool {
        let removed = if self.own_entries.remove(key).is_some() {
            true
        } else if let Some(&sector) = self.child_entries.get(key) {
            let removed = self.children.as_mut().unwrap()[sector.index()]
                .as_mut()
                .unwrap()
                .remove(key, false, merge_if_able);
            self.child_entries.remove(key);
            removed
        } else {
            false
        };

        if removed && merge_if_able && !is_root && self.should_merge() {
            self.merge();
        }
        removed
    }

    pub(crate) fn move_entry(&mut self, key: &K, new_bounds: Aabb, is_root: bool) -> MoveOutcome {
        let fits = |node: &Self, b: &Aabb| {
            if is_root {
                node.info.loose_encapsulates(b)
            } else {
                node.info.encapsulates(b)
            }
        };

        if let Some(_old) = self.own_entries.remove(key) {
            if fits(self, &new_bounds) {
                self.nocheck_add(key.clone(), new_bounds);
                MoveOutcome::Moved
            } else {
                if !is_root && self.should_merge() {
                    self.merge();
                }
                MoveOutcome::Removed
            }
        } else if let Some(&s_old) = self.child_entries.get(key) {
            if Sector::of_offset(new_bounds.centre - self.info.centre) == s_old {
                let outcome = self.children.as_mut().unwrap()[s_old.index()]
                    .as_mut()
                    .unwrap()
                    .move_entry(key, new_bounds, false);
                match outcome {
                    MoveOutcome::Moved => MoveOutcome::Moved,
                    MoveOutcome::None => {
                        log::error!("move_entry: child reported None for a key in its child_entries");
                        MoveOutcome::None
                    }
                    MoveOutcome::Removed => {
                        self.child_entries.remove(key);
                        if fits(self, &new_bounds) {
                            self.own_entries.insert(key.clone(), new_bounds);
                            MoveOutcome::Moved
                        } else {
                            MoveOutcome::Removed
                        }
                    }
                }
            } else {
                self.children.as_mut().unwrap()[s_old.index()]
                    .as_mut()
                    .unwrap()
                    .remove(key, false, true);
                self.child_entries.remove(key);
                if fits(self, &new_bounds) {
                    self.nocheck_add(key.clone(), new_bounds);
                    MoveOutcome::Moved
                } else {
                    if !is_root && self.should_merge() {
                        self.merge();
                    }
                    MoveOutcome::Removed
                }
            }
        } else {
            MoveOutcome::None
        }
    }

    /// Replaces `self` with a smaller equivalent if every entry in the subtree collapses into
    /// a single octant. A no-op if the node has already bottomed out at `min_length`, is
    /// empty, or entries are spread across more than one octant.
    pub(crate) fn shrink_if_possible(&mut self, min_length: f32) {
        if self.info.length < 2. * min_length || self.count() == 0 {
            return;
        }

        let mut candidate: Option<Sector> = None;
        for bounds in self.own_entries.values() {
            let sector = Sector::of_offset(bounds.centre - self.info.centre);
            if !self.child_boxes[sector.index()].loose_encapsulates(bounds) {
                return;
            }
            match candidate {
                None => candidate = Some(sector),
                Some(c) if c == sector => {}
                Some(_) => return,
            }
        }

        if let Some(children) = &self.children {
            for (i, child) in children.iter().enumerate() {
                let non_empty = child.as_ref().is_some_and(|c| c.count() > 0);
                if non_empty {
                    let sector = Sector::new(i as u8);
                    match candidate {
                        None => candidate = Some(sector),
                        Some(c) if c == sector => {}
                        Some(_) => return,
                    }
                }
            }
        }

        let Some(winner) = candidate else {
            return;
        };

        if self.children.is_none() {
            // No sub-node to promote: resize in place, one level further than a single
            // collapse (the new length is half the *child's* length, not the child's length
            // itself) -- preserved verbatim even though it looks like a 4x rather than 2x
            // shrink per call; see DESIGN.md for why this isn't "fixed".
            let child_box = self.child_boxes[winner.index()];
            self.info = BoxInfo::new(child_box.centre, child_box.length / 2., self.looseness);
            self.child_boxes = self.info.child_boxes(self.looseness);
            return;
        }

        let mut children = self.children.take().unwrap();
        let mut promoted = children[winner.index()]
            .take()
            .expect("candidate sector must have a materialised child");
        for (k, b) in self.own_entries.drain() {
            promoted.nocheck_add(k, b);
        }
        *self = *promoted;
    }

    pub(crate) fn is_intersecting(&self, query: &Aabb, filter: EntryFilter<K>) -> bool {
        if !self.info.loose_cube.intersects_aabb(query) {
            return false;
        }
        for (k, b) in &self.own_entries {
            if filter.is_none_or(|f| f(k, b)) && b.intersects_aabb(query) {
                return true;
            }
        }
        self.children
            .iter()
            .flat_map(|c| c.iter())
            .flatten()
            .any(|child| child.is_intersecting(query, filter))
    }

    pub(crate) fn get_intersecting(&self, query: &Aabb, filter: EntryFilter<K>, out: &mut Vec<K>) {
        if !self.info.loose_cube.intersects_aabb(query) {
            return;
        }
        for (k, b) in &self.own_entries {
            if filter.is_none_or(|f| f(k, b)) && b.intersects_aabb(query) {
                out.push(k.clone());
            }
        }
        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            child.get_intersecting(query, filter, out);
        }
    }

    pub(crate) fn raycast(
        &self,
        ray: &crate::geom::Ray,
        max_distance: f32,
        filter: EntryFilter<K>,
        out: &mut Vec<(K, f32)>,
    ) {
        match self.info.loose_cube.intersect_ray(ray) {
            Some(d) if d <= max_distance => {}
            _ => return,
        }
        for (k, b) in &self.own_entries {
            if filter.is_none_or(|f| f(k, b)) {
                if let Some(d) = b.intersect_ray(ray) {
                    if d <= max_distance {
                        out.push((k.clone(), d));
                    }
                }
            }
        }
        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            child.raycast(ray, max_distance, filter, out);
        }
    }

    pub(crate) fn get_within_frustum(
        &self,
        planes: &[Plane],
        filter: EntryFilter<K>,
        out: &mut Vec<K>,
    ) {
        if !crate::geom::plane::intersects_aabb(planes, &self.info.loose_cube) {
            return;
        }
        for (k, b) in &self.own_entries {
            if filter.is_none_or(|f| f(k, b)) && crate::geom::plane::intersects_aabb(planes, b) {
                out.push(k.clone());
            }
        }
        // The filter is forwarded on every recursive call, unlike the source this crate is
        // modelled on, which dropped it at one recursion site.
        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            child.get_within_frustum(planes, filter, out);
        }
    }

    pub(crate) fn find_best_match<S: PartialOrd + Copy>(
        &self,
        fitness: &dyn Fn(&K, &Aabb) -> Option<S>,
        node_filter: &dyn Fn(&BoxInfo) -> bool,
        entry_filter: EntryFilter<K>,
    ) -> Option<(K, S)> {
        if !node_filter(&self.info) {
            return None;
        }

        let mut best: Option<(K, S)> = None;
        for (k, b) in &self.own_entries {
            if entry_filter.is_none_or(|f| f(k, b)) {
                if let Some(score) = fitness(k, b) {
                    if best.as_ref().is_none_or(|(_, s)| score < *s) {
                        best = Some((k.clone(), score));
                    }
                }
            }
        }

        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            if let Some((k, score)) = child.find_best_match(fitness, node_filter, entry_filter) {
                if best.as_ref().is_none_or(|(_, s)| score < *s) {
                    best = Some((k, score));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;

    fn node(length: f32, min_node_size: f32) -> AabbNode<u32> {
        AabbNode::new(BoxInfo::new(Vec3::ZERO, length, 1.0), 1.0, min_node_size)
    }

    #[test]
    fn add_keeps_straddling_entry_at_this_level() {
        let mut n = node(8., 0.1);
        // A box centred at the origin straddles every child's midplane, so it stays put.
        n.nocheck_add(1, Aabb::cube(Vec3::ZERO, 7.));
        assert_eq!(n.own_entries.len(), 1);
        assert!(n.children.is_none());
    }

    #[test]
    fn split_triggers_after_capacity_exceeded() {
        let mut n = node(16., 0.1);
        for i in 0..9u32 {
            n.nocheck_add(i, Aabb::cube(Vec3::new(3., 3., 3.), 0.5));
        }
        assert!(n.children.is_some());
        assert_eq!(n.count(), 9);
    }

    #[test]
    fn remove_then_merge_collapses_children() {
        let mut n = node(16., 0.1);
        for i in 0..9u32 {
            n.nocheck_add(i, Aabb::cube(Vec3::new(3., 3., 3.), 0.5));
        }
        for i in 0..9u32 {
            n.remove(&i, false, true);
        }
        assert_eq!(n.count(), 0);
        assert!(n.children.is_none());
    }

    #[test]
    fn shrink_if_possible_no_children_halves_child_length_again() {
        let mut n = node(8., 0.01);
        n.nocheck_add(1, Aabb::cube(Vec3::new(1., 1., 1.), 0.5));
        n.shrink_if_possible(0.01);
        // child length would be 4, this crate's shrink halves that again to 2.
        assert_eq!(n.info.length, 2.);
        assert_eq!(n.info.centre, Vec3::new(2., 2., 2.));
    }
}
