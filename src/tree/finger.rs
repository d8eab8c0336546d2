//! Finger search: climb from a leaf until the target is in reach, then
//! descend.
//!
//! At each level the walk checks the current node's key range and the gap
//! and range of its neighbour on the target's side. Because the bounds grow
//! doubly exponentially with height, a target `d` ranks away is reached
//! after climbing `O(log log d)` levels, and each level costs a bounded
//! scan.

use crate::alloc::NodeId;
use crate::error::TreeError;
use crate::Key;

use super::{Finger, FingerTree};

/// Hop counts of one finger search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchTrace {
    /// Parent steps taken on the way up.
    pub climbed: u32,
    /// Steps to a neighbour on the same level.
    pub sideways: u32,
    /// Child steps taken on the way down.
    pub descended: u32,
}

impl SearchTrace {
    /// Total number of node-to-node steps.
    #[inline]
    #[must_use]
    pub const fn hops(&self) -> u32 {
        self.climbed + self.sideways + self.descended
    }
}

impl FingerTree {
    /// Leaf holding the predecessor of `value`, found from `finger`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] for a stale finger.
    pub fn finger_search(&self, finger: Finger, value: Key) -> Result<Finger, TreeError> {
        self.finger_search_traced(finger, value).map(|(found, _)| found)
    }

    /// [`FingerTree::finger_search`] that also reports how far it walked.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] for a stale finger.
    pub fn finger_search_traced(&self, finger: Finger, value: Key) -> Result<(Finger, SearchTrace), TreeError> {
        let (leaf, trace) = self.finger_locate(finger.0, value)?;
        Ok((Finger(leaf), trace))
    }

    pub(super) fn finger_locate(&self, start: NodeId, value: Key) -> Result<(NodeId, SearchTrace), TreeError> {
        if !self.forest.node(start)?.is_leaf() {
            return Err(TreeError::NotALeaf);
        }

        let mut trace: SearchTrace = SearchTrace::default();
        let mut current: NodeId = start;

        loop {
            let record = self.forest.node(current)?;
            if record.father().is_none() {
                break;
            }
            let min: Key = self.forest.min_value(current)?;
            let max: Key = self.forest.max_value(current)?;
            if min <= value && value <= max {
                break;
            }

            if value > max {
                let Some(right) = record.right() else {
                    break;
                };
                if value < self.forest.min_value(right)? {
                    break;
                }
                if value <= self.forest.max_value(right)? {
                    current = right;
                    trace.sideways += 1;
                    break;
                }
            } else {
                let Some(left) = record.left() else {
                    break;
                };
                if value >= self.forest.min_value(left)? {
                    current = left;
                    trace.sideways += 1;
                    break;
                }
            }

            current = self
                .forest
                .node_parent(current)?
                .ok_or(TreeError::CorruptLink("non-root without parent"))?;
            trace.climbed += 1;
        }

        while !self.forest.node(current)?.is_leaf() {
            current = self.forest.node_find_child_containing(current, value)?;
            trace.descended += 1;
        }
        Ok((current, trace))
    }
}
