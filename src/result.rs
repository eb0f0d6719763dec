/// Outcome of a `move_entry` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The key was not present in the tree.
    None,
    /// The entry left the tree and could not be reinserted at the new geometry (the caller
    /// should treat this the same as a failed `add`).
    Removed,
    /// The entry now lives at the new geometry.
    Moved,
}
