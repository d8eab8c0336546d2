//! Leaves and internal nodes.
//!
//! A node is either a leaf carrying one key, or an internal node at level
//! `L >= 1` owning a span of Block2 units. The children of an internal node
//! (through its Block2 and Block1 units) are the nodes of level `L - 1`
//! between its first and last key.

use crate::alloc::{Block1Id, Block2Id, GroupId, NodeId};
use crate::error::TreeError;
use crate::forest::{Forest, NodeObserver, Scope};
use crate::layer::{Links, Span};
use crate::tracing_helpers::{debug_log, warn_log};
use crate::{EMPTY_MAX, EMPTY_MIN, Key};

/// Block2 units an internal node holds before the driver splits it.
pub const MAX_BLOCK2_PER_NODE: usize = 3;

/// Upper bound on Block2 units one split moves into the new sibling.
pub const MAX_SPLIT_MIGRATION: usize = 3;

// ============================================================================
//  Record
// ============================================================================

/// Leaf payload or internal-node contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A stored key.
    Leaf {
        /// The key.
        value: Key,
    },
    /// A node owning Block2 units.
    Internal {
        /// Owned Block2 units.
        blocks: Span<Block2Id>,
        /// Number of child nodes, summed over the Block2 units.
        degree: usize,
        /// Group as stored; read it through [`Forest::resolve_group`].
        group: GroupId,
    },
}

/// A leaf or internal node.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) level: u32,
    pub(crate) links: Links<NodeId>,
    pub(crate) father: Option<Block1Id>,
    pub(crate) kind: NodeKind,
}

impl Node {
    /// Height above the leaves; leaves are level 0.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Previous node of the same level.
    #[inline]
    #[must_use]
    pub const fn left(&self) -> Option<NodeId> {
        self.links.left
    }

    /// Next node of the same level.
    #[inline]
    #[must_use]
    pub const fn right(&self) -> Option<NodeId> {
        self.links.right
    }

    /// Block1 holding this node; `None` for the root and for detached nodes.
    #[inline]
    #[must_use]
    pub const fn father(&self) -> Option<Block1Id> {
        self.father
    }

    /// Leaf or internal contents.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether this is a leaf.
    #[inline]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Stored key of a leaf.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> Option<Key> {
        match self.kind {
            NodeKind::Leaf { value } => Some(value),
            NodeKind::Internal { .. } => None,
        }
    }

    /// Number of child nodes (0 for leaves).
    #[inline]
    #[must_use]
    pub const fn degree(&self) -> usize {
        match self.kind {
            NodeKind::Internal { degree, .. } => degree,
            NodeKind::Leaf { .. } => 0,
        }
    }

    /// Owned Block2 span of an internal node.
    #[inline]
    #[must_use]
    pub const fn blocks(&self) -> Option<Span<Block2Id>> {
        match self.kind {
            NodeKind::Internal { blocks, .. } => Some(blocks),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Number of owned Block2 units (0 for leaves).
    #[inline]
    #[must_use]
    pub const fn block2_count(&self) -> usize {
        match self.kind {
            NodeKind::Internal { blocks, .. } => blocks.len,
            NodeKind::Leaf { .. } => 0,
        }
    }

    /// Stored group handle, possibly stale in the lazy sense.
    #[inline]
    #[must_use]
    pub const fn group(&self) -> Option<GroupId> {
        match self.kind {
            NodeKind::Internal { group, .. } => Some(group),
            NodeKind::Leaf { .. } => None,
        }
    }
}

/// Result of [`Forest::node_split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOutcome {
    /// The new right sibling.
    pub sibling: NodeId,
    /// Set when the split node was the root and a taller root was created.
    pub new_root: Option<NodeId>,
}

// ============================================================================
//  Operations
// ============================================================================

impl Forest {
    /// Smallest key in the subtree of `node`, `EMPTY_MIN` if it is empty.
    pub(crate) fn node_min(&self, node: NodeId) -> Result<Key, TreeError> {
        let mut current: NodeId = node;
        loop {
            let blocks: Span<Block2Id> = match self.nodes.get(current)?.kind {
                NodeKind::Leaf { value } => return Ok(value),
                NodeKind::Internal { blocks, .. } => blocks,
            };
            let Some(b2) = blocks.first else {
                return Ok(EMPTY_MIN);
            };
            let Some(b1) = self.blocks2.get(b2)?.blocks.first else {
                return Ok(EMPTY_MIN);
            };
            let Some(child) = self.blocks1.get(b1)?.children.first else {
                return Ok(EMPTY_MIN);
            };
            current = child;
        }
    }

    /// Largest key in the subtree of `node`, `EMPTY_MAX` if it is empty.
    pub(crate) fn node_max(&self, node: NodeId) -> Result<Key, TreeError> {
        let mut current: NodeId = node;
        loop {
            let blocks: Span<Block2Id> = match self.nodes.get(current)?.kind {
                NodeKind::Leaf { value } => return Ok(value),
                NodeKind::Internal { blocks, .. } => blocks,
            };
            let Some(b2) = blocks.last else {
                return Ok(EMPTY_MAX);
            };
            let Some(b1) = self.blocks2.get(b2)?.blocks.last else {
                return Ok(EMPTY_MAX);
            };
            let Some(child) = self.blocks1.get(b1)?.children.last else {
                return Ok(EMPTY_MAX);
            };
            current = child;
        }
    }

    /// Smallest key below `node`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn min_value(&self, node: NodeId) -> Result<Key, TreeError> {
        self.node_min(node)
    }

    /// Largest key below `node`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn max_value(&self, node: NodeId) -> Result<Key, TreeError> {
        self.node_max(node)
    }

    /// Whether `value` lies in the key range of `node`. The root contains
    /// every value.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn node_contains_value(&self, node: NodeId, value: Key) -> Result<bool, TreeError> {
        if self.nodes.get(node)?.father.is_none() {
            return Ok(true);
        }
        Ok(self.node_min(node)? <= value && value <= self.node_max(node)?)
    }

    /// Child node of `node` to descend into when looking for `value`.
    ///
    /// Picks the child containing `value`, else the child just before the gap
    /// it falls into, else the last child (value above the node) or the
    /// first child (value below the node).
    ///
    /// # Errors
    ///
    /// [`TreeError::NotALeaf`] for leaves, [`TreeError::EmptyContainer`] if
    /// the node has no children.
    pub fn node_find_child_containing(&self, node: NodeId, value: Key) -> Result<NodeId, TreeError> {
        let b2: Block2Id = self
            .find_child_in::<NodeId>(node, value)?
            .ok_or(TreeError::EmptyContainer)?;
        let b1: Block1Id = self.block2_find_child_containing(b2, value)?;
        self.block1_find_child_containing(b1, value)
    }

    /// Parent node, one level up.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn node_parent(&self, node: NodeId) -> Result<Option<NodeId>, TreeError> {
        match self.nodes.get(node)?.father {
            Some(b1) => {
                let b2: Block2Id = self.blocks1.get(b1)?.father;
                Ok(Some(self.blocks2.get(b2)?.node))
            }
            None => Ok(None),
        }
    }

    /// Insert `block2` into `node` between the in-node neighbours `left` and
    /// `right` (both `None` only when `node` is empty).
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if a neighbour lives in another node.
    pub fn node_add(
        &mut self,
        node: NodeId,
        left: Option<Block2Id>,
        block2: Block2Id,
        right: Option<Block2Id>,
    ) -> Result<(), TreeError> {
        let (chain_left, chain_right) = self.chain_neighbours::<NodeId>(node, left, right)?;
        self.attach::<NodeId>(node, block2, chain_left, chain_right)
    }

    /// Remove the empty `block2` from `node` and free it. An emptied node is
    /// released through the observer.
    ///
    /// # Errors
    ///
    /// [`TreeError::CorruptLink`] if `block2` is not in `node` or still holds
    /// Block1 units.
    pub fn node_remove<O: NodeObserver + ?Sized>(
        &mut self,
        node: NodeId,
        block2: Block2Id,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        if !self.blocks2.get(block2)?.blocks.is_empty() {
            return Err(TreeError::CorruptLink("removing a non-empty block2"));
        }
        self.block2_unpair(block2)?;
        self.block2_forget_pending(block2)?;
        self.detach::<NodeId>(node, block2)?;
        self.blocks2.remove(block2)?;
        self.release_empty(Scope::Node(node), observer)
    }

    /// Whether `node` holds at least two independent Block2 runs, where a
    /// run is a maximal sequence of Block2 units joined by mate or pending
    /// links. Nodes with more than four Block2 units always qualify.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotALeaf`] for leaves.
    pub fn node_contains_at_least_two_block2_pairs(&self, node: NodeId) -> Result<bool, TreeError> {
        let blocks: Span<Block2Id> = self.nodes.get(node)?.blocks().ok_or(TreeError::NotALeaf)?;
        if blocks.len > 4 {
            return Ok(true);
        }

        let mut runs: usize = 0;
        let mut previous: Option<Block2Id> = None;
        let mut cursor: Option<Block2Id> = blocks.first;
        for _ in 0..blocks.len {
            let Some(current) = cursor else {
                break;
            };
            let joined: bool = match previous {
                Some(prev) => self.block2_linked(prev, current)?,
                None => false,
            };
            if !joined {
                runs += 1;
            }
            previous = Some(current);
            cursor = self.blocks2.get(current)?.links.right;
        }
        Ok(runs >= 2)
    }

    /// Split `node` by moving its tail Block2 units into a new right
    /// sibling.
    ///
    /// The last Block2 always moves. The new tail follows while it is linked
    /// (mate or pending) to the unit that just moved, up to
    /// [`MAX_SPLIT_MIGRATION`] units in total; a link that would still
    /// straddle the boundary is dropped. A root is first wrapped in a new
    /// root one level up. The sibling joins `node`'s group.
    ///
    /// # Errors
    ///
    /// [`TreeError::CannotSplit`] if `node` has fewer than two Block2 units.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub fn node_split(&mut self, node: NodeId) -> Result<SplitOutcome, TreeError> {
        let record: &Node = self.nodes.get(node)?;
        let level: u32 = record.level;
        let father: Option<Block1Id> = record.father;
        if record.block2_count() < 2 {
            return Err(TreeError::CannotSplit);
        }

        let mut new_root: Option<NodeId> = None;
        let parent_block: Block1Id = match father {
            Some(block) => block,
            None => {
                let (root, block) = self.grow_root(node)?;
                new_root = Some(root);
                block
            }
        };

        let sibling: NodeId = self.create_internal(level)?;
        let right: Option<NodeId> = self.nodes.get(node)?.links.right;
        self.attach::<Block1Id>(parent_block, sibling, Some(node), right)?;

        let mut moved: usize = 0;
        loop {
            let tail: Block2Id = self.boundary_child::<NodeId>(node, true)?;
            self.rehome::<NodeId>(node, sibling, tail, true)?;
            moved += 1;

            let new_tail: Block2Id = self.boundary_child::<NodeId>(node, true)?;
            if !self.block2_linked(new_tail, tail)? {
                break;
            }
            if moved >= MAX_SPLIT_MIGRATION || self.nodes.get(node)?.block2_count() <= 1 {
                warn_log!(node = %node, left = %new_tail, right = %tail, "split dropped a straddling link");
                self.block2_unlink(new_tail, tail)?;
                break;
            }
        }

        self.group_add(node, sibling)?;
        debug_log!(node = %node, sibling = %sibling, moved, "node split");
        Ok(SplitOutcome { sibling, new_root })
    }

    /// Wrap the root `node` in a new root one level up.
    fn grow_root(&mut self, node: NodeId) -> Result<(NodeId, Block1Id), TreeError> {
        let level: u32 = self.nodes.get(node)?.level;
        let root: NodeId = self.create_internal(level + 1)?;
        let b2: Block2Id = self.create_block2(root)?;
        self.attach::<NodeId>(root, b2, None, None)?;
        let b1: Block1Id = self.create_block1(b2)?;
        self.attach::<Block2Id>(b2, b1, None, None)?;
        self.attach::<Block1Id>(b1, node, None, None)?;
        debug_log!(root = %root, level = level + 1, "grew new root");
        Ok((root, b1))
    }
}
