//! Drag-and-drop reordering of a step list.
//!
//! Moving is total: an illegal request returns the list unchanged so the
//! editing surface can snap the dragged step back.

use tracing::debug;

use super::steps::{StepList, LOCKED_PREFIX};

/// Whether moving `source` to `dest` in a list of `len` steps is allowed.
///
/// `dest` is a position in the list after `source` has been taken out, so the
/// largest legal value is `len - 1`.
pub fn is_legal_move(len: usize, source: usize, dest: usize) -> bool {
    source >= LOCKED_PREFIX && dest >= LOCKED_PREFIX && source < len && dest < len
}

/// Moves the step at `source` to `dest` with splice semantics and renumbers.
pub fn move_step(list: &StepList, source: usize, dest: usize) -> StepList {
    if !is_legal_move(list.len(), source, dest) {
        debug!(
            "Rejected move of step {} to {} in a list of {}",
            source,
            dest,
            list.len()
        );
        return list.clone();
    }
    if source == dest {
        return list.clone();
    }

    let mut steps = list.clone().into_steps();
    let step = steps.remove(source);
    steps.insert(dest, step);

    let mut moved = StepList::from_steps_unchecked(steps);
    moved.normalize_order();
    moved
}
