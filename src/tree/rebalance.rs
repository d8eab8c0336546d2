//! Repair policy: when the tree calls which `Forest` primitive.

use crate::alloc::{Block1Id, Block2Id, GroupId, NodeId};
use crate::bounds;
use crate::error::TreeError;
use crate::node::{MAX_BLOCK2_PER_NODE, SplitOutcome};
use crate::tracing_helpers::debug_log;

use super::{FingerTree, RootWatch};

impl FingerTree {
    /// Hand surplus children of an overfull Block1 to a non-full mate,
    /// pairing it with a fresh Block1 on its right when needed.
    pub(super) fn settle_block1(&mut self, block: Block1Id) -> Result<(), TreeError> {
        let capacity: usize = bounds::a(self.forest.block1_level(block)?);
        while self.forest.blocks1.contains(block) && self.forest.block1(block)?.degree() > capacity {
            match self.forest.block1(block)?.mate() {
                Some(mate) if !self.forest.block1_is_full(mate)? => {}
                Some(_) => {
                    self.forest.block1_unpair(block)?;
                    self.forest.block1_create_mate_right(block)?;
                }
                None => {
                    self.forest.block1_create_mate_right(block)?;
                }
            }
            self.forest
                .block1_transfer_to_mate(block, &mut RootWatch { root: &mut self.root })?;
        }
        Ok(())
    }

    /// Same as [`FingerTree::settle_block1`] one layer up, against the
    /// mode-dependent Block2 threshold.
    fn settle_block2(&mut self, block: Block2Id) -> Result<(), TreeError> {
        loop {
            if !self.forest.blocks2.contains(block) {
                return Ok(());
            }
            let threshold: usize = self.forest.block2_threshold(block)?;
            if self.forest.block2(block)?.degree() <= threshold {
                return Ok(());
            }
            match self.forest.block2(block)?.mate() {
                Some(mate) if !self.forest.block2_is_full(mate)? => {}
                Some(_) => {
                    self.forest.block2_unpair(block)?;
                    self.forest.block2_create_mate_right(block)?;
                }
                None => {
                    self.forest.block2_create_mate_right(block)?;
                }
            }
            self.forest
                .block2_transfer_to_mate(block, &mut RootWatch { root: &mut self.root })?;
        }
    }

    /// A multi-node group that grew into split mode is retired so that its
    /// members fall back to fusion-mode thresholds.
    fn retire_split_group(&mut self, node: NodeId) -> Result<(), TreeError> {
        let group: GroupId = self.forest.resolve_group(node)?;
        if self.forest.group(group)?.members() > 1 && self.forest.group_is_split(group)? {
            self.forest.group_multi_break(group)?;
        }
        Ok(())
    }

    /// Settle `block` and split its node while it holds too many Block2
    /// units, continuing at the parent after each split.
    pub(super) fn repair_from_block2(&mut self, block: Block2Id) -> Result<(), TreeError> {
        let mut current: Block2Id = block;
        loop {
            if !self.forest.blocks2.contains(current) {
                return Ok(());
            }
            let node: NodeId = self.forest.block2(current)?.node();
            self.retire_split_group(node)?;
            self.settle_block2(current)?;

            if self.forest.node(node)?.block2_count() <= MAX_BLOCK2_PER_NODE {
                return Ok(());
            }

            let outcome: SplitOutcome = self.forest.node_split(node)?;
            if let Some(root) = outcome.new_root {
                self.root = Some(root);
            }

            let parent: Block1Id = self
                .forest
                .node(outcome.sibling)?
                .father()
                .ok_or(TreeError::CorruptLink("split sibling without father"))?;
            self.settle_block1(parent)?;

            let parent: Block1Id = self
                .forest
                .node(outcome.sibling)?
                .father()
                .ok_or(TreeError::CorruptLink("split sibling without father"))?;
            current = self.forest.block1(parent)?.father();
        }
    }

    /// Fuse a light, single-node group with an adjacent group, or let it
    /// borrow a Block2 from a neighbour that has Block2 runs to spare.
    ///
    /// Only single-member groups are relieved. An underfull node inside a
    /// multi-node group is left alone until that group is broken, either by
    /// [`crate::Forest::group_multi_break`] or lazily on its next
    /// [`crate::Forest::resolve_group`].
    pub(super) fn relieve_underflow(&mut self, node: NodeId) -> Result<(), TreeError> {
        if self.root == Some(node) {
            return Ok(());
        }
        let record = self.forest.node(node)?;
        let level: u32 = record.level();
        if record.degree() > bounds::a(level) {
            return Ok(());
        }
        let neighbours: [Option<NodeId>; 2] = [record.left(), record.right()];

        let group: GroupId = self.forest.resolve_group(node)?;
        if self.forest.group(group)?.members() != 1 {
            return Ok(());
        }

        for neighbour in neighbours.into_iter().flatten() {
            let other: GroupId = self.forest.resolve_group(neighbour)?;
            if self.forest.group_can_be_fused(group, other)? {
                let receiving: Block2Id =
                    self.forest
                        .group_fuse(group, other, &mut RootWatch { root: &mut self.root })?;
                debug_log!(node = %node, into = %receiving, "light node fused");
                self.forest.block2_settle_pending(receiving)?;
                return self.repair_from_block2(receiving);
            }
        }

        if !self.forest.group_has_only_one_block1(group)? {
            return Ok(());
        }
        for neighbour in neighbours.into_iter().flatten() {
            let other: GroupId = self.forest.resolve_group(neighbour)?;
            let rich: bool = self.forest.group(other)?.members() == 1
                && self.forest.node(neighbour)?.block2_count() >= 2
                && self.forest.node_contains_at_least_two_block2_pairs(neighbour)?;
            if rich {
                let borrowed: Block2Id =
                    self.forest
                        .group_share(group, other, &mut RootWatch { root: &mut self.root })?;
                debug_log!(node = %node, block2 = %borrowed, "light node shared");
                return self.repair_from_block2(borrowed);
            }
        }
        Ok(())
    }

    /// Replace a root that has a single child by that child, repeatedly.
    /// A level-1 root is kept even with one leaf.
    pub(super) fn collapse_root(&mut self) -> Result<(), TreeError> {
        while let Some(root) = self.root {
            let record = self.forest.node(root)?;
            if record.level() <= 1 || record.degree() != 1 {
                return Ok(());
            }
            let child: NodeId = self.forest.node_find_child_containing(root, crate::Key::MIN)?;
            let block: Block1Id = self
                .forest
                .node(child)?
                .father()
                .ok_or(TreeError::CorruptLink("child without father"))?;
            self.forest
                .block1_remove(block, child, &mut RootWatch { root: &mut self.root })?;
            debug_log!(old = %root, new = %child, "root collapsed");
            self.root = Some(child);
        }
        Ok(())
    }
}
