//! Block2: a buffered run of Block1 units.
//!
//! A Block2 inside a node of level `L` holds Block1 units whose combined
//! child count is the Block2 degree. It is full at `F(L)` while the node's
//! group is in fusion mode and at `B⁺(L)` once the group is in split mode.
//!
//! Besides the symmetric `mate` link a Block2 may carry a one-way `pending`
//! link to an adjacent unit. Pending marks a pairing that a fuse wanted but
//! could not make yet because the neighbour was already paired; it is
//! confirmed or dropped by [`Forest::block2_settle_pending`].

use crate::alloc::{Block1Id, Block2Id, NodeId};
use crate::block1::Block1;
use crate::bounds;
use crate::error::TreeError;
use crate::forest::{Forest, NodeObserver, Scope};
use crate::layer::{Links, Span};
use crate::tracing_helpers::trace_log;
use crate::Key;

/// A run of Block1 units inside one node.
#[derive(Debug, Clone)]
pub struct Block2 {
    pub(crate) links: Links<Block2Id>,
    pub(crate) mate: Option<Block2Id>,
    pub(crate) pending: Option<Block2Id>,
    pub(crate) node: NodeId,
    pub(crate) blocks: Span<Block1Id>,
    pub(crate) degree: usize,
}

impl Block2 {
    /// Number of nodes held by the Block1 units of this block.
    #[inline]
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Number of Block1 units.
    #[inline]
    #[must_use]
    pub const fn block1_count(&self) -> usize {
        self.blocks.len
    }

    /// First Block1.
    #[inline]
    #[must_use]
    pub const fn first(&self) -> Option<Block1Id> {
        self.blocks.first
    }

    /// Last Block1.
    #[inline]
    #[must_use]
    pub const fn last(&self) -> Option<Block1Id> {
        self.blocks.last
    }

    /// Previous Block2 of the same level.
    #[inline]
    #[must_use]
    pub const fn left(&self) -> Option<Block2Id> {
        self.links.left
    }

    /// Next Block2 of the same level.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> Option<Block2Id> {
        self.links.right
    }

    /// Paired neighbour.
    #[inline]
    #[must_use]
    pub const fn mate(&self) -> Option<Block2Id> {
        self.mate
    }

    /// Provisional pairing target.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> Option<Block2Id> {
        self.pending
    }

    /// Owning node.
    #[inline]
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }
}

impl Forest {
    /// Level of the node that owns `block2`.
    pub(crate) fn block2_level(&self, block2: Block2Id) -> Result<u32, TreeError> {
        let node: NodeId = self.blocks2.get(block2)?.node;
        Ok(self.nodes.get(node)?.level)
    }

    /// Current capacity of `block2`: `B⁺(L)` when the owning node's group is
    /// in split mode, `F(L)` otherwise. Repairs the node's group first.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_threshold(&mut self, block2: Block2Id) -> Result<usize, TreeError> {
        let node: NodeId = self.blocks2.get(block2)?.node;
        let level: u32 = self.nodes.get(node)?.level;
        let group = self.resolve_group(node)?;
        if self.group_is_split(group)? {
            Ok(bounds::b_plus(level))
        } else {
            Ok(bounds::f(level))
        }
    }

    /// Whether `block2` has reached its current capacity.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_is_full(&mut self, block2: Block2Id) -> Result<bool, TreeError> {
        let threshold: usize = self.block2_threshold(block2)?;
        Ok(self.blocks2.get(block2)?.degree >= threshold)
    }

    /// Whether `value` lies between the first and last key of `block2`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_contains_value(&self, block2: Block2Id, value: Key) -> Result<bool, TreeError> {
        Ok(self.container_min(block2)? <= value && value <= self.container_max(block2)?)
    }

    /// Block1 of `block2` to descend into for `value`.
    ///
    /// # Errors
    ///
    /// [`TreeError::EmptyContainer`] if the block has no Block1 units.
    pub fn block2_find_child_containing(&self, block2: Block2Id, value: Key) -> Result<Block1Id, TreeError> {
        self.find_child_in::<Block2Id>(block2, value)?
            .ok_or(TreeError::EmptyContainer)
    }

    /// Insert `block1` between the in-block neighbours `left` and `right`,
    /// with the same outward linking as [`Forest::block1_add`].
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if a neighbour belongs to another block.
    pub fn block2_add(
        &mut self,
        block2: Block2Id,
        left: Option<Block1Id>,
        block1: Block1Id,
        right: Option<Block1Id>,
    ) -> Result<(), TreeError> {
        let (chain_left, chain_right) = self.chain_neighbours::<Block2Id>(block2, left, right)?;
        self.attach::<Block2Id>(block2, block1, chain_left, chain_right)
    }

    /// Remove the empty `block1` from `block2` and free it. An emptied Block2
    /// is released in turn.
    ///
    /// # Errors
    ///
    /// [`TreeError::CorruptLink`] if `block1` is not in `block2` or still has
    /// children.
    pub fn block2_remove<O: NodeObserver + ?Sized>(
        &mut self,
        block2: Block2Id,
        block1: Block1Id,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        if !self.blocks1.get(block1)?.children.is_empty() {
            return Err(TreeError::CorruptLink("removing a non-empty block1"));
        }
        self.block1_unpair(block1)?;
        self.detach::<Block2Id>(block2, block1)?;
        self.blocks1.remove(block1)?;
        self.release_empty(Scope::Block2(block2), observer)
    }

    // ------------------------------------------------------------------
    //  Mate and pending links
    // ------------------------------------------------------------------

    fn block2_neighbours_in_node(&self, a: Block2Id, b: Block2Id) -> Result<bool, TreeError> {
        let first: &Block2 = self.blocks2.get(a)?;
        let second: &Block2 = self.blocks2.get(b)?;
        Ok(first.node == second.node
            && (first.links.right == Some(b) || first.links.left == Some(b)))
    }

    /// Pair two adjacent, unpaired Block2 units of the same node.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if they are not neighbours in one node,
    /// [`TreeError::CorruptLink`] if either already has a mate.
    pub fn block2_pair(&mut self, a: Block2Id, b: Block2Id) -> Result<(), TreeError> {
        if !self.block2_neighbours_in_node(a, b)? {
            return Err(TreeError::NotAdjacent);
        }
        if self.blocks2.get(a)?.mate.is_some() || self.blocks2.get(b)?.mate.is_some() {
            return Err(TreeError::CorruptLink("block2 already paired"));
        }
        self.blocks2.get_mut(a)?.mate = Some(b);
        self.blocks2.get_mut(b)?.mate = Some(a);
        Ok(())
    }

    /// Dissolve the mate pairing of `block2`, if any.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_unpair(&mut self, block2: Block2Id) -> Result<(), TreeError> {
        if let Some(mate) = self.blocks2.get_mut(block2)?.mate.take() {
            if let Ok(other) = self.blocks2.get_mut(mate) {
                if other.mate == Some(block2) {
                    other.mate = None;
                }
            }
        }
        Ok(())
    }

    /// Mark `block2` as provisionally paired with its neighbour `partner`.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if they are not neighbours in one node.
    pub fn block2_set_pending(&mut self, block2: Block2Id, partner: Block2Id) -> Result<(), TreeError> {
        if !self.block2_neighbours_in_node(block2, partner)? {
            return Err(TreeError::NotAdjacent);
        }
        self.blocks2.get_mut(block2)?.pending = Some(partner);
        Ok(())
    }

    /// Create an empty Block2 right after `block2` in the same node and pair
    /// the two. `block2` must be unpaired.
    pub(crate) fn block2_create_mate_right(&mut self, block2: Block2Id) -> Result<Block2Id, TreeError> {
        let node: NodeId = self.blocks2.get(block2)?.node;
        let fresh: Block2Id = self.create_block2(node)?;
        self.node_add(node, Some(block2), fresh, None)?;
        self.block2_pair(block2, fresh)?;
        Ok(fresh)
    }

    /// Clear the pending link of `block2` and every neighbour's pending link
    /// that targets it.
    pub(crate) fn block2_forget_pending(&mut self, block2: Block2Id) -> Result<(), TreeError> {
        let record: &mut Block2 = self.blocks2.get_mut(block2)?;
        record.pending = None;
        let links: Links<Block2Id> = record.links;
        for neighbour in [links.left, links.right].into_iter().flatten() {
            let other: &mut Block2 = self.blocks2.get_mut(neighbour)?;
            if other.pending == Some(block2) {
                other.pending = None;
            }
        }
        Ok(())
    }

    /// Whether a mate or pending link joins `a` and `b` in either direction.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_linked(&self, a: Block2Id, b: Block2Id) -> Result<bool, TreeError> {
        let first: &Block2 = self.blocks2.get(a)?;
        let second: &Block2 = self.blocks2.get(b)?;
        Ok(first.mate == Some(b)
            || second.mate == Some(a)
            || first.pending == Some(b)
            || second.pending == Some(a))
    }

    /// Drop every mate or pending link between `a` and `b`.
    pub(crate) fn block2_unlink(&mut self, a: Block2Id, b: Block2Id) -> Result<(), TreeError> {
        if self.blocks2.get(a)?.mate == Some(b) {
            self.block2_unpair(a)?;
        }
        for (from, to) in [(a, b), (b, a)] {
            let record: &mut Block2 = self.blocks2.get_mut(from)?;
            if record.pending == Some(to) {
                record.pending = None;
            }
        }
        Ok(())
    }

    /// Resolve a provisional link on `block2`.
    ///
    /// A link whose partner is gone or no longer adjacent is dropped. If both
    /// sides are now unpaired the link becomes a real mate pairing. A full
    /// `block2` drops the link; otherwise it stays pending.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `block2` itself was freed.
    pub fn block2_settle_pending(&mut self, block2: Block2Id) -> Result<(), TreeError> {
        let Some(partner) = self.blocks2.get(block2)?.pending else {
            return Ok(());
        };

        let adjacent: bool =
            self.blocks2.contains(partner) && self.block2_neighbours_in_node(block2, partner)?;
        if !adjacent {
            self.blocks2.get_mut(block2)?.pending = None;
            return Ok(());
        }

        let unpaired: bool =
            self.blocks2.get(block2)?.mate.is_none() && self.blocks2.get(partner)?.mate.is_none();
        if unpaired {
            self.blocks2.get_mut(block2)?.pending = None;
            self.block2_pair(block2, partner)?;
            trace_log!(block2 = %block2, partner = %partner, "pending link confirmed");
        } else if self.block2_is_full(block2)? {
            self.blocks2.get_mut(block2)?.pending = None;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    //  Transfers
    // ------------------------------------------------------------------

    /// Move one node from `block2` into its mate.
    ///
    /// The node leaves the Block1 of `block2` that faces the mate and enters
    /// the mate's facing Block1 (created if the mate is empty). Then:
    ///
    /// - if the receiving Block1 overflows `A(L)` it passes a node on to a
    ///   non-full mate, pairing it first with a new Block1 on its right when
    ///   it has none (or only a full one, in which case the full pair is
    ///   dissolved);
    /// - if the donor Block1 was full it is refilled by one node from inside
    ///   its Block2, pairing it with its inner neighbour when it has no mate;
    /// - an emptied donor Block1 is released.
    ///
    /// # Errors
    ///
    /// [`TreeError::MissingMate`] without a mate, [`TreeError::NotAdjacent`]
    /// if the mate is not a neighbour.
    pub fn block2_transfer_to_mate<O: NodeObserver + ?Sized>(
        &mut self,
        block2: Block2Id,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        let record: &Block2 = self.blocks2.get(block2)?;
        let mate: Block2Id = record.mate.ok_or(TreeError::MissingMate)?;
        let towards_right: bool = if record.links.right == Some(mate) {
            true
        } else if record.links.left == Some(mate) {
            false
        } else {
            return Err(TreeError::NotAdjacent);
        };
        let level: u32 = self.block2_level(block2)?;
        let capacity: usize = bounds::a(level);

        let from: Block1Id = self.boundary_child::<Block2Id>(block2, towards_right)?;
        let from_was_full: bool = self.blocks1.get(from)?.children.len >= capacity;

        let facing: Option<Block1Id> = {
            let span: Span<Block1Id> = self.blocks2.get(mate)?.blocks;
            if towards_right { span.first } else { span.last }
        };
        let to: Block1Id = match facing {
            Some(block) => block,
            None => {
                let block: Block1Id = self.create_block1(mate)?;
                let from_links: Links<Block1Id> = self.blocks1.get(from)?.links;
                let (chain_left, chain_right) = if towards_right {
                    (Some(from), from_links.right)
                } else {
                    (from_links.left, Some(from))
                };
                self.attach::<Block2Id>(mate, block, chain_left, chain_right)?;
                block
            }
        };

        let moved: NodeId = self.boundary_child::<Block1Id>(from, towards_right)?;
        self.rehome::<Block1Id>(from, to, moved, towards_right)?;
        trace_log!(from = %block2, to = %mate, node = %moved, "block2 transfer to mate");

        // Receiver side.
        if self.blocks1.get(to)?.children.len > capacity {
            match self.blocks1.get(to)?.mate {
                Some(partner) if self.blocks1.get(partner)?.children.len < capacity => {}
                Some(_) => {
                    self.block1_unpair(to)?;
                    self.block1_create_mate_right(to)?;
                }
                None => {
                    self.block1_create_mate_right(to)?;
                }
            }
            self.block1_transfer_to_mate(to, observer)?;
        }

        // Donor side.
        self.release_empty(Scope::Block1(from), observer)?;
        if from_was_full && self.blocks1.contains(from) {
            self.block1_refill(block2, from, towards_right, observer)?;
        }

        self.retire_if_straddling(moved)
    }

    /// Give the full Block1 `from`, which just lost its boundary node on the
    /// `towards_right` side, one node back from inside `block2`.
    ///
    /// A mate refills it directly. Otherwise its inner neighbour becomes its
    /// mate and refills it, or, when that neighbour is already paired, hands
    /// over one node and is refilled by its own mate if it was full.
    fn block1_refill<O: NodeObserver + ?Sized>(
        &mut self,
        block2: Block2Id,
        from: Block1Id,
        towards_right: bool,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        let record: &Block1 = self.blocks1.get(from)?;
        if let Some(partner) = record.mate {
            self.block1_transfer_to_mate(partner, observer)?;
            return Ok(());
        }
        let inner: Option<Block1Id> = if towards_right { record.links.left } else { record.links.right };
        let Some(inner) = inner else {
            return Ok(());
        };
        if self.blocks1.get(inner)?.father != block2 {
            return Ok(());
        }

        match self.blocks1.get(inner)?.mate {
            None => {
                self.block1_pair(from, inner)?;
                self.block1_transfer_to_mate(inner, observer)?;
            }
            Some(inner_mate) => {
                let capacity: usize = bounds::a(self.block2_level(block2)?);
                let inner_was_full: bool = self.blocks1.get(inner)?.children.len >= capacity;
                let shared: NodeId = self.boundary_child::<Block1Id>(inner, towards_right)?;
                self.rehome::<Block1Id>(inner, from, shared, towards_right)?;
                trace_log!(from = %inner, to = %from, node = %shared, "block1 shared one node");
                self.release_empty(Scope::Block1(inner), observer)?;
                if inner_was_full && self.blocks1.contains(inner_mate) && self.blocks1.contains(inner) {
                    self.block1_transfer_to_mate(inner_mate, observer)?;
                }
                self.retire_if_straddling(shared)?;
            }
        }
        Ok(())
    }

    /// Move the Block1 of `from` that faces `to` into `to`, together with its
    /// mate when the mate is also in `from`. An emptied `from` is released.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if `to` is not a neighbour of `from`.
    pub fn block2_transfer<O: NodeObserver + ?Sized>(
        &mut self,
        from: Block2Id,
        to: Block2Id,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        let record: &Block2 = self.blocks2.get(from)?;
        let towards_right: bool = if record.links.right == Some(to) {
            true
        } else if record.links.left == Some(to) {
            false
        } else {
            return Err(TreeError::NotAdjacent);
        };

        let boundary: Block1Id = self.boundary_child::<Block2Id>(from, towards_right)?;
        let mate: Option<Block1Id> = self.blocks1.get(boundary)?.mate;
        self.rehome::<Block2Id>(from, to, boundary, towards_right)?;

        if let Some(partner) = mate {
            let follows: bool = self.blocks1.get(partner)?.father == from
                && self.boundary_child::<Block2Id>(from, towards_right)? == partner;
            if follows {
                self.rehome::<Block2Id>(from, to, partner, towards_right)?;
            }
        }
        trace_log!(from = %from, to = %to, "block2 transfer");

        self.release_empty(Scope::Block2(from), observer)
    }

    /// Whether the pairing of `block2` could be broken without cutting a
    /// group: the two nodes on either side of the boundary it shares with
    /// its mate (or pending partner) belong to different groups. Leaves
    /// carry no group, so a boundary between leaves is always breakable.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block2_is_break_possible(&mut self, block2: Block2Id) -> Result<bool, TreeError> {
        let record: &Block2 = self.blocks2.get(block2)?;
        let Some(partner) = record.mate.or(record.pending) else {
            return Ok(false);
        };
        let towards_right: bool = if record.links.right == Some(partner) {
            true
        } else if record.links.left == Some(partner) {
            false
        } else {
            return Ok(false);
        };

        let block: Block1Id = self.boundary_child::<Block2Id>(block2, towards_right)?;
        let inner: NodeId = self.boundary_child::<Block1Id>(block, towards_right)?;
        let inner_links: Links<NodeId> = self.nodes.get(inner)?.links;
        let outer: Option<NodeId> = if towards_right {
            inner_links.right
        } else {
            inner_links.left
        };
        let Some(outer) = outer else {
            return Ok(false);
        };

        if self.nodes.get(inner)?.is_leaf() {
            return Ok(true);
        }
        Ok(self.resolve_group(inner)? != self.resolve_group(outer)?)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Fail fast in tests")]
mod tests {
    use super::*;
    use crate::forest::NoopObserver;

    /// Level-1 node with one Block2 per entry of `layout`; each Block2 holds
    /// one Block1 per inner entry with that many consecutive leaves.
    fn build(forest: &mut Forest, layout: &[&[usize]]) -> (NodeId, Vec<Block2Id>) {
        let node: NodeId = forest.create_internal(1).unwrap();
        let mut blocks: Vec<Block2Id> = Vec::new();
        let mut next_key: Key = 0;

        for sizes in layout {
            let b2: Block2Id = forest.create_block2(node).unwrap();
            forest.node_add(node, blocks.last().copied(), b2, None).unwrap();
            let mut previous_b1: Option<Block1Id> = None;
            for &size in *sizes {
                let b1: Block1Id = forest.create_block1(b2).unwrap();
                forest.block2_add(b2, previous_b1, b1, None).unwrap();
                let mut previous_leaf: Option<NodeId> = None;
                for _ in 0..size {
                    let leaf: NodeId = forest.create_leaf(next_key).unwrap();
                    next_key += 1;
                    forest.block1_add(b1, previous_leaf, leaf, None).unwrap();
                    previous_leaf = Some(leaf);
                }
                previous_b1 = Some(b1);
            }
            blocks.push(b2);
        }
        (node, blocks)
    }

    fn block1_sizes(forest: &Forest, block2: Block2Id) -> Vec<usize> {
        let record: &Block2 = forest.block2(block2).unwrap();
        let mut sizes: Vec<usize> = Vec::new();
        let mut cursor: Option<Block1Id> = record.first();
        while let Some(b1) = cursor {
            sizes.push(forest.block1(b1).unwrap().degree());
            if Some(b1) == record.last() {
                break;
            }
            cursor = forest.block1(b1).unwrap().right();
        }
        sizes
    }

    #[test]
    fn test_transfer_to_empty_mate_creates_block1() {
        let mut forest: Forest = Forest::new();
        let (node, blocks) = build(&mut forest, &[&[3]]);
        let mate: Block2Id = forest.create_block2(node).unwrap();
        forest.node_add(node, Some(blocks[0]), mate, None).unwrap();
        forest.block2_pair(blocks[0], mate).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![2]);
        assert_eq!(block1_sizes(&forest, mate), vec![1]);
        assert_eq!(forest.block2(mate).unwrap().degree(), 1);
        assert_eq!(forest.node(node).unwrap().degree(), 3);
        assert_eq!(forest.max_value(node).unwrap(), 2);
    }

    #[test]
    fn test_transfer_overflowing_receiver_pairs_new_block1() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[2], &[16]]);
        forest.block2_pair(blocks[0], blocks[1]).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        // The receiving Block1 took one node, overflowed and passed one on.
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![16, 1]);
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![1]);
        let first: Block1Id = forest.block2(blocks[1]).unwrap().first().unwrap();
        let second: Block1Id = forest.block2(blocks[1]).unwrap().last().unwrap();
        assert_eq!(forest.block1(first).unwrap().mate(), Some(second));
    }

    #[test]
    fn test_transfer_from_full_donor_refills_from_its_mate() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[5, 16], &[1]]);
        let inner: Block1Id = forest.block2(blocks[0]).unwrap().first().unwrap();
        let outer: Block1Id = forest.block2(blocks[0]).unwrap().last().unwrap();
        forest.block1_pair(inner, outer).unwrap();
        forest.block2_pair(blocks[0], blocks[1]).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![4, 16]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2]);
    }

    #[test]
    fn test_unpaired_full_donor_pairs_inner_neighbour() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[5, 16], &[1]]);
        let inner: Block1Id = forest.block2(blocks[0]).unwrap().first().unwrap();
        let outer: Block1Id = forest.block2(blocks[0]).unwrap().last().unwrap();
        forest.block2_pair(blocks[0], blocks[1]).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![4, 16]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2]);
        assert_eq!(forest.block1(outer).unwrap().mate(), Some(inner));
        assert_eq!(forest.block1(inner).unwrap().mate(), Some(outer));
    }

    #[test]
    fn test_unpaired_full_donor_pairs_inner_neighbour_leftward() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[1], &[16, 5]]);
        let outer: Block1Id = forest.block2(blocks[1]).unwrap().first().unwrap();
        let inner: Block1Id = forest.block2(blocks[1]).unwrap().last().unwrap();
        forest.block2_pair(blocks[1], blocks[0]).unwrap();

        forest.block2_transfer_to_mate(blocks[1], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![2]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![16, 4]);
        assert_eq!(forest.block1(outer).unwrap().mate(), Some(inner));
    }

    #[test]
    fn test_full_donor_borrows_from_paired_inner_neighbour() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[3, 5, 16], &[1]]);
        let first: Block1Id = forest.block2(blocks[0]).unwrap().first().unwrap();
        let inner: Block1Id = forest.block1(first).unwrap().right().unwrap();
        let outer: Block1Id = forest.block2(blocks[0]).unwrap().last().unwrap();
        forest.block1_pair(first, inner).unwrap();
        forest.block2_pair(blocks[0], blocks[1]).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![3, 4, 16]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2]);
        assert_eq!(forest.block1(outer).unwrap().mate(), None);
        assert_eq!(forest.block1(first).unwrap().mate(), Some(inner));
    }

    #[test]
    fn test_full_inner_neighbour_is_refilled_by_its_mate() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[3, 16, 16], &[1]]);
        let first: Block1Id = forest.block2(blocks[0]).unwrap().first().unwrap();
        let inner: Block1Id = forest.block1(first).unwrap().right().unwrap();
        forest.block1_pair(first, inner).unwrap();
        forest.block2_pair(blocks[0], blocks[1]).unwrap();

        forest.block2_transfer_to_mate(blocks[0], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![2, 16, 16]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2]);
        assert_eq!(forest.block2(blocks[0]).unwrap().degree(), 34);
    }

    #[test]
    fn test_transfer_leftward() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[1], &[3]]);
        forest.block2_pair(blocks[1], blocks[0]).unwrap();

        forest.block2_transfer_to_mate(blocks[1], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![2]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2]);
    }

    #[test]
    fn test_transfer_moves_block1_with_its_mate() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[1, 2, 3], &[4]]);
        let middle: Block1Id = forest.block1(forest.block2(blocks[0]).unwrap().last().unwrap()).unwrap().left().unwrap();
        let last: Block1Id = forest.block2(blocks[0]).unwrap().last().unwrap();
        forest.block1_pair(middle, last).unwrap();

        forest.block2_transfer(blocks[0], blocks[1], &mut NoopObserver).unwrap();
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![1]);
        assert_eq!(block1_sizes(&forest, blocks[1]), vec![2, 3, 4]);
        assert_eq!(forest.block2(blocks[0]).unwrap().degree(), 1);
        assert_eq!(forest.block2(blocks[1]).unwrap().degree(), 9);
    }

    #[test]
    fn test_transfer_that_empties_releases_source() {
        let mut forest: Forest = Forest::new();
        let (node, blocks) = build(&mut forest, &[&[2], &[4]]);

        forest.block2_transfer(blocks[1], blocks[0], &mut NoopObserver).unwrap();
        assert!(forest.block2(blocks[1]).is_err());
        assert_eq!(forest.node(node).unwrap().block2_count(), 1);
        assert_eq!(block1_sizes(&forest, blocks[0]), vec![2, 4]);
    }

    #[test]
    fn test_threshold_follows_group_mode() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[2]]);
        assert_eq!(forest.block2_threshold(blocks[0]).unwrap(), 256);
        assert!(!forest.block2_is_full(blocks[0]).unwrap());
    }

    #[test]
    fn test_break_possible_between_leaves() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[2], &[2], &[2]]);
        assert!(!forest.block2_is_break_possible(blocks[0]).unwrap());
        forest.block2_pair(blocks[0], blocks[1]).unwrap();
        assert!(forest.block2_is_break_possible(blocks[0]).unwrap());
        assert!(forest.block2_is_break_possible(blocks[1]).unwrap());
    }

    #[test]
    fn test_pending_confirmed_when_both_unpaired() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[1], &[1], &[1]]);
        forest.block2_pair(blocks[0], blocks[1]).unwrap();
        forest.block2_set_pending(blocks[2], blocks[1]).unwrap();

        forest.block2_settle_pending(blocks[2]).unwrap();
        assert_eq!(forest.block2(blocks[2]).unwrap().pending(), Some(blocks[1]));

        forest.block2_unpair(blocks[1]).unwrap();
        forest.block2_settle_pending(blocks[2]).unwrap();
        assert_eq!(forest.block2(blocks[2]).unwrap().pending(), None);
        assert_eq!(forest.block2(blocks[2]).unwrap().mate(), Some(blocks[1]));
    }

    #[test]
    fn test_pending_dropped_when_partner_released() {
        let mut forest: Forest = Forest::new();
        let (_, blocks) = build(&mut forest, &[&[1], &[1]]);
        forest.block2_set_pending(blocks[1], blocks[0]).unwrap();

        let b1: Block1Id = forest.block2(blocks[0]).unwrap().first().unwrap();
        let leaf: NodeId = forest.block1(b1).unwrap().first().unwrap();
        forest.block1_remove(b1, leaf, &mut NoopObserver).unwrap();

        assert!(forest.block2(blocks[0]).is_err());
        assert_eq!(forest.block2(blocks[1]).unwrap().pending(), None);
    }
}
