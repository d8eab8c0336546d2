//! In-order iteration along the leaf chain.

use std::iter::FusedIterator;

use crate::alloc::NodeId;
use crate::forest::Forest;
use crate::Key;

/// Ascending iterator over the keys of a [`FingerTree`](super::FingerTree).
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    forest: &'a Forest,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(super) const fn new(forest: &'a Forest, start: Option<NodeId>, len: usize) -> Self {
        Self {
            forest,
            next: start,
            remaining: len,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Key> {
        let current: NodeId = self.next?;
        let record = self.forest.node(current).ok()?;
        self.next = record.right();
        self.remaining = self.remaining.saturating_sub(1);
        record.value()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}
