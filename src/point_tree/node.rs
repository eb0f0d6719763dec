use std::collections::HashMap;
use std::hash::Hash;

use crate::geom::{Aabb, BoxInfo, Ray, Sector, Vec3};
use crate::result::MoveOutcome;

/// Points have no extent, so looseness adds no admissibility slack: the loose cube always
/// equals the strict cube.
const POINT_LOOSENESS: f32 = 1.0;

pub(crate) const MAX_NODE_ENTRIES: usize = 8;

pub type EntryFilter<'a, K> = Option<&'a dyn Fn(&K, &Vec3) -> bool>;

/// A node of the point loose octree. Structurally identical to the AABB variant's node, but
/// every entry is a bare point: the loose/strict distinction collapses (an admitted point
/// always also belongs, so `split` never leaves anything behind in `own_entries`).
pub(crate) struct PointNode<K> {
    pub(crate) info: BoxInfo,
    pub(crate) own_entries: HashMap<K, Vec3>,
    pub(crate) child_entries: HashMap<K, Sector>,
    pub(crate) children: Option<Box<[Option<Box<PointNode<K>>>; 8]>>,
    pub(crate) child_boxes: [BoxInfo; 8],
    min_node_size: f32,
}

impl<K> PointNode<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new(info: BoxInfo, min_node_size: f32) -> Self {
        let child_boxes = info.child_boxes(POINT_LOOSENESS);
        Self {
            info,
            own_entries: HashMap::new(),
            child_entries: HashMap::new(),
            children: None,
            child_boxes,
            min_node_size,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.own_entries.len() + self.child_entries.len()
    }

    pub(crate) fn all_keys(&self) -> Vec<K> {
        let mut out: Vec<K> = self.own_entries.keys().cloned().collect();
        out.extend(self.child_entries.keys().cloned());
        out
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.own_entries.contains_key(key) || self.child_entries.contains_key(key)
    }

    pub(crate) fn adopt_single_child(&mut self, sector: Sector, child: Box<PointNode<K>>) {
        let keys = child.all_keys();
        let mut children: Box<[Option<Box<PointNode<K>>>; 8]> = Box::new(Default::default());
        children[sector.index()] = Some(child);
        self.children = Some(children);
        self.child_entries.clear();
        for k in keys {
            self.child_entries.insert(k, sector);
        }
    }

    fn child_mut_or_insert(&mut self, sector: Sector) -> &mut PointNode<K> {
        let children = self
            .children
            .get_or_insert_with(|| Box::new(Default::default()));
        let slot = &mut children[sector.index()];
        if slot.is_none() {
            *slot = Some(Box::new(PointNode::new(
                self.child_boxes[sector.index()],
                self.min_node_size,
            )));
        }
        slot.as_mut().unwrap()
    }

    pub(crate) fn add(&mut self, key: K, point: Vec3) -> bool {
        if !self.info.loose_encapsulates(&Aabb::point(point)) {
            return false;
        }
        if self.remove(&key, true, true) {
            log::warn!("add: key already present in tree, replacing with new position");
        }
        self.nocheck_add(key, point);
        true
    }

    pub(crate) fn nocheck_add(&mut self, key: K, point: Vec3) {
        if self.children.is_none() {
            let child_length = self.info.length / 2.;
            if self.count() < MAX_NODE_ENTRIES || child_length < self.min_node_size {
                self.own_entries.insert(key, point);
                return;
            }
            self.split();
        }

        let sector = Sector::of_offset(point - self.info.centre);
        if !self.child_boxes[sector.index()].encapsulates(&Aabb::point(point)) {
            self.own_entries.insert(key, point);
            return;
        }

        self.child_entries.insert(key.clone(), sector);
        self.child_mut_or_insert(sector).nocheck_add(key, point);
    }

    fn split(&mut self) {
        if self.children.is_none() {
            self.children = Some(Box::new(Default::default()));
        }
        let entries: Vec<(K, Vec3)> = self.own_entries.drain().collect();
        for (key, point) in entries {
            let sector = Sector::of_offset(point - self.info.centre);
            if self.child_boxes[sector.index()].encapsulates(&Aabb::point(point)) {
                self.child_entries.insert(key.clone(), sector);
                self.child_mut_or_insert(sector).nocheck_add(key, point);
            } else {
                // Unreachable for well-formed points (see module docs), kept for parity with
                // the AABB node's split in case `min_node_size` forces a tiny child cube.
                self.own_entries.insert(key, point);
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
                for (k, p) in child.own_entries.drain() {
                    self.own_entries.insert(k, p);
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

    pub(crate) fn move_entry(&mut self, key: &K, new_point: Vec3, is_root: bool) -> MoveOutcome {
        let fits = |node: &Self, p: Vec3| {
            let b = Aabb::point(p);
            if is_root {
                node.info.loose_encapsulates(&b)
            } else {
                node.info.encapsulates(&b)
            }
        };

        if let Some(_old) = self.own_entries.remove(key) {
            if fits(self, new_point) {
                self.nocheck_add(key.clone(), new_point);
                MoveOutcome::Moved
            } else {
                if !is_root && self.should_merge() {
                    self.merge();
                }
                MoveOutcome::Removed
            }
        } else if let Some(&s_old) = self.child_entries.get(key) {
            if Sector::of_offset(new_point - self.info.centre) == s_old {
                let outcome = self.children.as_mut().unwrap()[s_old.index()]
                    .as_mut()
                    .unwrap()
                    .move_entry(key, new_point, false);
                match outcome {
                    MoveOutcome::Moved => MoveOutcome::Moved,
                    MoveOutcome::None => {
                        log::error!("move_entry: child reported None for a key in its child_entries");
                        MoveOutcome::None
                    }
                    MoveOutcome::Removed => {
                        self.child_entries.remove(key);
                        if fits(self, new_point) {
                            self.own_entries.insert(key.clone(), new_point);
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
                if fits(self, new_point) {
                    self.nocheck_add(key.clone(), new_point);
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

    pub(crate) fn shrink_if_possible(&mut self, min_length: f32) {
        if self.info.length < 2. * min_length || self.count() == 0 {
            return;
        }

        let mut candidate: Option<Sector> = None;
        for point in self.own_entries.values() {
            let sector = Sector::of_offset(*point - self.info.centre);
            if !self.child_boxes[sector.index()].loose_encapsulates(&Aabb::point(*point)) {
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
            let child_box = self.child_boxes[winner.index()];
            self.info = BoxInfo::new(child_box.centre, child_box.length / 2., POINT_LOOSENESS);
            self.child_boxes = self.info.child_boxes(POINT_LOOSENESS);
            return;
        }

        let mut children = self.children.take().unwrap();
        let mut promoted = children[winner.index()]
            .take()
            .expect("candidate sector must have a materialised child");
        for (k, p) in self.own_entries.drain() {
            promoted.nocheck_add(k, p);
        }
        *self = *promoted;
    }

    /// True closest-point-on-cube sphere prune (see crate docs for why the cheaper
    /// expanded-AABB test was not chosen).
    fn sphere_prune(&self, centre: Vec3, max_distance: f32) -> bool {
        let closest = self.info.loose_cube.closest_point(centre);
        (closest - centre).squared_length() <= max_distance * max_distance
    }

    pub(crate) fn get_nearby_point(
        &self,
        centre: Vec3,
        max_distance: f32,
        filter: EntryFilter<K>,
        out: &mut Vec<(K, Vec3, f32)>,
    ) {
        if !self.sphere_prune(centre, max_distance) {
            return;
        }
        let max_sq = max_distance * max_distance;
        for (k, p) in &self.own_entries {
            if filter.is_none_or(|f| f(k, p)) {
                let d = (*p - centre).squared_length();
                if d <= max_sq {
                    out.push((k.clone(), *p, d));
                }
            }
        }
        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            child.get_nearby_point(centre, max_distance, filter, out);
        }
    }

    pub(crate) fn get_nearby_ray(
        &self,
        ray: &Ray,
        max_distance: f32,
        filter: EntryFilter<K>,
        out: &mut Vec<(K, Vec3, f32)>,
    ) {
        let expanded = Aabb::new(
            self.info.loose_cube.centre,
            self.info.loose_cube.half_extents + Vec3::splat(max_distance),
        );
        if expanded.intersect_ray(ray).is_none() {
            return;
        }
        let max_sq = max_distance * max_distance;
        for (k, p) in &self.own_entries {
            if filter.is_none_or(|f| f(k, p)) {
                let d = ray.squared_distance_to_point(*p);
                if d <= max_sq {
                    out.push((k.clone(), *p, d));
                }
            }
        }
        for child in self.children.iter().flat_map(|c| c.iter()).flatten() {
            child.get_nearby_ray(ray, max_distance, filter, out);
        }
    }

    pub(crate) fn find_best_match<S: PartialOrd + Copy>(
        &self,
        fitness: &dyn Fn(&K, &Vec3) -> Option<S>,
        node_filter: &dyn Fn(&BoxInfo) -> bool,
        entry_filter: EntryFilter<K>,
    ) -> Option<(K, S)> {
        if !node_filter(&self.info) {
            return None;
        }

        let mut best: Option<(K, S)> = None;
        for (k, p) in &self.own_entries {
            if entry_filter.is_none_or(|f| f(k, p)) {
                if let Some(score) = fitness(k, p) {
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

    fn node(length: f32, min_node_size: f32) -> PointNode<u32> {
        PointNode::new(BoxInfo::new(Vec3::ZERO, length, POINT_LOOSENESS), min_node_size)
    }

    #[test]
    fn split_pushes_every_point_into_a_child() {
        let mut n = node(16., 0.1);
        for i in 0..9u32 {
            n.nocheck_add(i, Vec3::new(3., 3., 3.));
        }
        assert!(n.children.is_some());
        assert_eq!(n.own_entries.len(), 0);
        assert_eq!(n.count(), 9);
    }

    #[test]
    fn remove_all_collapses_back_to_leaf() {
        let mut n = node(16., 0.1);
        for i in 0..9u32 {
            n.nocheck_add(i, Vec3::new(3., 3., 3.));
        }
        for i in 0..9u32 {
            n.remove(&i, false, true);
        }
        assert_eq!(n.count(), 0);
        assert!(n.children.is_none());
    }

    #[test]
    fn get_nearby_point_matches_linear_scan() {
        let mut n = node(10., 0.5);
        let points = [
            Vec3::new(0.5, 0., 0.),
            Vec3::new(2., 0., 0.),
            Vec3::new(0., 0.9, 0.),
            Vec3::new(-3., -3., -3.),
        ];
        for (i, p) in points.iter().enumerate() {
            n.nocheck_add(i as u32, *p);
        }
        let mut out = Vec::new();
        n.get_nearby_point(Vec3::ZERO, 1.0, None, &mut out);
        let mut expected: Vec<u32> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.squared_length() <= 1.0)
            .map(|(i, _)| i as u32)
            .collect();
        let mut got: Vec<u32> = out.iter().map(|(k, _, _)| *k).collect();
        expected.sort();
        got.sort();
        assert_eq!(got, expected);
    }
}
