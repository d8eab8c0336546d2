//! Block1: a buffered run of sibling nodes.
//!
//! A Block1 inside a node of level `L` holds nodes of level `L - 1`. Its
//! degree is its child count and it is full at `A(L)` children. Two adjacent
//! Block1s of the same Block2 may be paired as mates; an overflowing Block1
//! hands single boundary children to its mate in O(1).

use crate::alloc::{Block1Id, Block2Id, NodeId};
use crate::bounds;
use crate::error::TreeError;
use crate::forest::{Forest, NodeObserver, Scope};
use crate::layer::{Links, Span};
use crate::tracing_helpers::trace_log;
use crate::Key;

/// A run of sibling nodes inside one Block2.
#[derive(Debug, Clone)]
pub struct Block1 {
    pub(crate) links: Links<Block1Id>,
    pub(crate) mate: Option<Block1Id>,
    pub(crate) father: Block2Id,
    pub(crate) children: Span<NodeId>,
}

impl Block1 {
    /// Number of child nodes.
    #[inline]
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.children.len
    }

    /// First child.
    #[inline]
    #[must_use]
    pub const fn first(&self) -> Option<NodeId> {
        self.children.first
    }

    /// Last child.
    #[inline]
    #[must_use]
    pub const fn last(&self) -> Option<NodeId> {
        self.children.last
    }

    /// Previous Block1 of the same level.
    #[inline]
    #[must_use]
    pub const fn left(&self) -> Option<Block1Id> {
        self.links.left
    }

    /// Next Block1 of the same level.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> Option<Block1Id> {
        self.links.right
    }

    /// Paired neighbour.
    #[inline]
    #[must_use]
    pub const fn mate(&self) -> Option<Block1Id> {
        self.mate
    }

    /// Owning Block2.
    #[inline]
    #[must_use]
    pub const fn father(&self) -> Block2Id {
        self.father
    }
}

impl Forest {
    /// Level of the node that owns `block1`.
    pub(crate) fn block1_level(&self, block1: Block1Id) -> Result<u32, TreeError> {
        let b2: Block2Id = self.blocks1.get(block1)?.father;
        let node: NodeId = self.blocks2.get(b2)?.node;
        Ok(self.nodes.get(node)?.level)
    }

    /// Whether `block1` holds at least `A(L)` children.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block1_is_full(&self, block1: Block1Id) -> Result<bool, TreeError> {
        let level: u32 = self.block1_level(block1)?;
        Ok(self.blocks1.get(block1)?.children.len >= bounds::a(level))
    }

    /// Whether `value` lies between the first and last key of `block1`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block1_contains_value(&self, block1: Block1Id, value: Key) -> Result<bool, TreeError> {
        Ok(self.container_min(block1)? <= value && value <= self.container_max(block1)?)
    }

    /// Child of `block1` to descend into for `value`, with the same
    /// fallbacks as [`Forest::node_find_child_containing`].
    ///
    /// # Errors
    ///
    /// [`TreeError::EmptyContainer`] if the block has no children.
    pub fn block1_find_child_containing(&self, block1: Block1Id, value: Key) -> Result<NodeId, TreeError> {
        self.find_child_in::<Block1Id>(block1, value)?
            .ok_or(TreeError::EmptyContainer)
    }

    /// Insert `node` between the in-block neighbours `left` and `right`.
    ///
    /// Either neighbour fixes the position. With neither, the block must be
    /// empty and the node is linked between the last node of the nearest
    /// non-empty Block1 to the left and the first node of the nearest one to
    /// the right. The degree of the block, its Block2, node and group grows
    /// by one.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if a neighbour belongs to another block.
    pub fn block1_add(
        &mut self,
        block1: Block1Id,
        left: Option<NodeId>,
        node: NodeId,
        right: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let (chain_left, chain_right) = self.chain_neighbours::<Block1Id>(block1, left, right)?;
        self.attach::<Block1Id>(block1, node, chain_left, chain_right)
    }

    /// Unlink `node` from `block1`. The node itself stays allocated and
    /// detached. An emptied block is released, which may cascade upward.
    ///
    /// # Errors
    ///
    /// [`TreeError::CorruptLink`] if `node` is not a child of `block1`.
    pub fn block1_remove<O: NodeObserver + ?Sized>(
        &mut self,
        block1: Block1Id,
        node: NodeId,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        self.detach::<Block1Id>(block1, node)?;
        self.nodes.get_mut(node)?.father = None;
        self.release_empty(Scope::Block1(block1), observer)
    }

    /// Pair two adjacent, unpaired Block1s of the same Block2.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if they are not neighbours in one Block2,
    /// [`TreeError::CorruptLink`] if either already has a mate.
    pub fn block1_pair(&mut self, a: Block1Id, b: Block1Id) -> Result<(), TreeError> {
        let first: &Block1 = self.blocks1.get(a)?;
        let second: &Block1 = self.blocks1.get(b)?;
        if first.father != second.father || (first.links.right != Some(b) && first.links.left != Some(b)) {
            return Err(TreeError::NotAdjacent);
        }
        if first.mate.is_some() || second.mate.is_some() {
            return Err(TreeError::CorruptLink("block1 already paired"));
        }
        self.blocks1.get_mut(a)?.mate = Some(b);
        self.blocks1.get_mut(b)?.mate = Some(a);
        Ok(())
    }

    /// Dissolve the mate pairing of `block1`, if any.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn block1_unpair(&mut self, block1: Block1Id) -> Result<(), TreeError> {
        if let Some(mate) = self.blocks1.get_mut(block1)?.mate.take() {
            if let Ok(other) = self.blocks1.get_mut(mate) {
                if other.mate == Some(block1) {
                    other.mate = None;
                }
            }
        }
        Ok(())
    }

    /// Create an empty Block1 right after `block1` in the same Block2 and
    /// pair the two. `block1` must be unpaired.
    pub(crate) fn block1_create_mate_right(&mut self, block1: Block1Id) -> Result<Block1Id, TreeError> {
        let father: Block2Id = self.blocks1.get(block1)?.father;
        let fresh: Block1Id = self.create_block1(father)?;
        self.block2_add(father, Some(block1), fresh, None)?;
        self.block1_pair(block1, fresh)?;
        Ok(fresh)
    }

    /// Move the boundary child of `block1` that faces its mate into the mate.
    ///
    /// If the mate is the right neighbour the last child becomes the mate's
    /// first; otherwise the first child becomes the mate's last. The block is
    /// released if this empties it. A multi-node group left straddling two
    /// Block1s by the move is retired.
    ///
    /// # Errors
    ///
    /// [`TreeError::MissingMate`] without a mate, [`TreeError::NotAdjacent`]
    /// if the mate is not a neighbour.
    pub fn block1_transfer_to_mate<O: NodeObserver + ?Sized>(
        &mut self,
        block1: Block1Id,
        observer: &mut O,
    ) -> Result<NodeId, TreeError> {
        let record: &Block1 = self.blocks1.get(block1)?;
        let mate: Block1Id = record.mate.ok_or(TreeError::MissingMate)?;
        let towards_right: bool = if record.links.right == Some(mate) {
            true
        } else if record.links.left == Some(mate) {
            false
        } else {
            return Err(TreeError::NotAdjacent);
        };

        let moved: NodeId = self.boundary_child::<Block1Id>(block1, towards_right)?;
        self.rehome::<Block1Id>(block1, mate, moved, towards_right)?;
        trace_log!(from = %block1, to = %mate, node = %moved, "block1 transfer to mate");

        self.release_empty(Scope::Block1(block1), observer)?;
        self.retire_if_straddling(moved)?;
        Ok(moved)
    }
}
