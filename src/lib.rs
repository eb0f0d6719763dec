//! A pair of dynamic, loose octrees for indexing three-dimensional entities by location:
//! [`aabb_tree::AabbOctree`] indexes axis-aligned bounding boxes, [`point_tree::PointOctree`]
//! indexes bare points. Both are in-memory acceleration structures supporting incremental
//! insertion, removal, and relocation alongside intersection, nearest-neighbour, and
//! frustum-containment queries.
//!
//! `geom` holds the crate's self-contained vector/AABB/ray/plane primitives; a host embedding
//! this crate in a larger engine is expected to convert its own math types into these at the
//! call boundary.

pub mod aabb_tree;
pub mod error;
pub mod geom;
pub mod point_tree;
pub mod result;

pub use aabb_tree::AabbOctree;
pub use error::OctreeError;
pub use point_tree::PointOctree;
pub use result::MoveOutcome;
