//! `FingerTree` - an ordered set of `i64` keys with finger search.
//!
//! The tree owns a [`Forest`] and decides when its repair primitives run:
//!
//! - after an insert the touched Block1, then its Block2, hand surplus to a
//!   mate; a node holding more than [`MAX_BLOCK2_PER_NODE`] Block2 units is
//!   split and the repair continues one level up;
//! - after a remove every ancestor that became light is fused into, or
//!   borrows from, an adjacent group, and a root left with one child is
//!   replaced by that child.
//!
//! Searches return a [`Finger`], a handle to the leaf holding the
//! predecessor of the target (or the first leaf when the target is below
//! every key). A finger stays usable until its key is removed; after that
//! every call that takes it fails with [`TreeError::StaleHandle`].
//!
//! [`MAX_BLOCK2_PER_NODE`]: crate::node::MAX_BLOCK2_PER_NODE

use std::fmt as StdFmt;

use crate::alloc::{Block1Id, Block2Id, NodeId};
use crate::error::TreeError;
use crate::forest::{Forest, NodeObserver};
use crate::tracing_helpers::debug_log;
use crate::validate::Census;
use crate::Key;

mod finger;
mod iter;
mod rebalance;

pub use finger::SearchTrace;
pub use iter::Iter;

// ============================================================================
//  Finger
// ============================================================================

/// A reference to one leaf of a [`FingerTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Finger(NodeId);

impl Finger {
    /// The leaf handle behind this finger.
    #[inline]
    #[must_use]
    pub const fn node(self) -> NodeId {
        self.0
    }
}

impl StdFmt::Display for Finger {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        write!(f, "finger({})", self.0)
    }
}

/// Clears the root when a cascade frees it.
struct RootWatch<'a> {
    root: &'a mut Option<NodeId>,
}

impl NodeObserver for RootWatch<'_> {
    fn on_node_emptied(&mut self, _forest: &Forest, node: NodeId) {
        if *self.root == Some(node) {
            debug_log!(root = %node, "root emptied");
            *self.root = None;
        }
    }
}

// ============================================================================
//  FingerTree
// ============================================================================

/// An ordered set of [`Key`]s supporting finger search.
///
/// # Example
///
/// ```
/// use fingersearch::FingerTree;
///
/// let mut tree = FingerTree::new();
/// for key in [30, 10, 20] {
///     tree.insert(key).unwrap();
/// }
/// let finger = tree.search(25).unwrap().unwrap();
/// assert_eq!(tree.value(finger).unwrap(), 20);
///
/// let near = tree.finger_search(finger, 30).unwrap();
/// assert_eq!(tree.value(near).unwrap(), 30);
/// ```
#[derive(Debug, Default)]
pub struct FingerTree {
    forest: Forest,
    root: Option<NodeId>,
    len: usize,
}

impl FingerTree {
    /// Create an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forest: Forest::new(),
            root: None,
            len: 0,
        }
    }

    /// Number of stored keys.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree stores no keys.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Level of the root; 0 for an empty tree.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.root
            .and_then(|root| self.forest.node(root).ok())
            .map_or(0, crate::node::Node::level)
    }

    /// Current root node.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Read access to the underlying forest.
    #[inline]
    #[must_use]
    pub const fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Smallest key.
    ///
    /// # Errors
    ///
    /// Only on a corrupted structure.
    pub fn first(&self) -> Result<Option<Key>, TreeError> {
        self.root.map(|root| self.forest.min_value(root)).transpose()
    }

    /// Largest key.
    ///
    /// # Errors
    ///
    /// Only on a corrupted structure.
    pub fn last(&self) -> Result<Option<Key>, TreeError> {
        self.root.map(|root| self.forest.max_value(root)).transpose()
    }

    /// Keys in ascending order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        let start: Option<NodeId> = self.root.and_then(|root| self.descend(root, Key::MIN).ok());
        Iter::new(&self.forest, start, self.len)
    }

    /// Key stored at `finger`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] once the key was removed.
    pub fn value(&self, finger: Finger) -> Result<Key, TreeError> {
        self.forest.node(finger.0)?.value().ok_or(TreeError::NotALeaf)
    }

    /// Leaf holding the predecessor of `value`, or the first leaf when
    /// `value` is below every key. `None` for an empty tree.
    ///
    /// # Errors
    ///
    /// Only on a corrupted structure.
    pub fn search(&self, value: Key) -> Result<Option<Finger>, TreeError> {
        match self.root {
            Some(root) => Ok(Some(Finger(self.descend(root, value)?))),
            None => Ok(None),
        }
    }

    /// Whether `value` is stored.
    ///
    /// # Errors
    ///
    /// Only on a corrupted structure.
    pub fn contains(&self, value: Key) -> Result<bool, TreeError> {
        match self.search(value)? {
            Some(finger) => Ok(self.value(finger)? == value),
            None => Ok(false),
        }
    }

    /// Insert `value`. Returns `false` if it was already present.
    ///
    /// # Errors
    ///
    /// [`TreeError::ArenaFull`] when an arena is exhausted; anything else
    /// indicates a corrupted structure.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub fn insert(&mut self, value: Key) -> Result<bool, TreeError> {
        let Some(root) = self.root else {
            self.bootstrap(value)?;
            return Ok(true);
        };
        let anchor: NodeId = self.descend(root, value)?;
        self.insert_at(anchor, value)
    }

    /// Insert `value`, locating its position by a finger search from
    /// `finger`. Cheap when `value` is close to the finger's key.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] for a stale finger.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub fn insert_near(&mut self, finger: Finger, value: Key) -> Result<bool, TreeError> {
        let (anchor, _) = self.finger_locate(finger.0, value)?;
        self.insert_at(anchor, value)
    }

    /// Remove `value`. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// Only on a corrupted structure.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub fn remove(&mut self, value: Key) -> Result<bool, TreeError> {
        let Some(root) = self.root else {
            return Ok(false);
        };
        let leaf: NodeId = self.descend(root, value)?;
        if self.forest.node(leaf)?.value() != Some(value) {
            return Ok(false);
        }
        self.remove_leaf(leaf)?;
        Ok(true)
    }

    /// Run the full structural check and confirm the key count.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvariantViolated`] describing the first violation.
    pub fn check_invariants(&self) -> Result<Census, TreeError> {
        let census: Census = self.forest.validate(self.root)?;
        if census.leaves != self.len {
            return Err(TreeError::InvariantViolated(format!(
                "tree counts {} keys, found {} leaves",
                self.len, census.leaves
            )));
        }
        Ok(census)
    }

    // ------------------------------------------------------------------
    //  Internals
    // ------------------------------------------------------------------

    /// Descend from `from` to the leaf holding the predecessor of `value`.
    fn descend(&self, from: NodeId, value: Key) -> Result<NodeId, TreeError> {
        let mut current: NodeId = from;
        while !self.forest.node(current)?.is_leaf() {
            current = self.forest.node_find_child_containing(current, value)?;
        }
        Ok(current)
    }

    /// Build a level-1 root holding the single leaf `value`.
    fn bootstrap(&mut self, value: Key) -> Result<(), TreeError> {
        let root: NodeId = self.forest.create_internal(1)?;
        let b2: Block2Id = self.forest.create_block2(root)?;
        self.forest.node_add(root, None, b2, None)?;
        let b1: Block1Id = self.forest.create_block1(b2)?;
        self.forest.block2_add(b2, None, b1, None)?;
        let leaf: NodeId = self.forest.create_leaf(value)?;
        self.forest.block1_add(b1, None, leaf, None)?;
        self.root = Some(root);
        self.len = 1;
        debug_log!(root = %root, "tree bootstrapped");
        Ok(())
    }

    /// Insert `value` next to `anchor`, its predecessor (or the first leaf
    /// when `value` is the new minimum), then repair.
    fn insert_at(&mut self, anchor: NodeId, value: Key) -> Result<bool, TreeError> {
        let record = self.forest.node(anchor)?;
        let existing: Key = record.value().ok_or(TreeError::NotALeaf)?;
        if existing == value {
            return Ok(false);
        }
        let block: Block1Id = record.father.ok_or(TreeError::CorruptLink("leaf without father"))?;

        let leaf: NodeId = self.forest.create_leaf(value)?;
        if value > existing {
            self.forest.block1_add(block, Some(anchor), leaf, None)?;
        } else {
            self.forest.block1_add(block, None, leaf, Some(anchor))?;
        }
        self.len += 1;

        self.settle_block1(block)?;
        let parent: Block1Id = self
            .forest
            .node(leaf)?
            .father
            .ok_or(TreeError::CorruptLink("leaf without father"))?;
        let b2: Block2Id = self.forest.block1(parent)?.father();
        self.repair_from_block2(b2)?;
        Ok(true)
    }

    /// Unlink and free `leaf`, then relieve its ancestors.
    fn remove_leaf(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let mut path: Vec<NodeId> = Vec::new();
        let mut cursor: Option<NodeId> = self.forest.node_parent(leaf)?;
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.forest.node_parent(node)?;
        }

        let block: Block1Id = self
            .forest
            .node(leaf)?
            .father
            .ok_or(TreeError::CorruptLink("leaf without father"))?;
        self.forest
            .block1_remove(block, leaf, &mut RootWatch { root: &mut self.root })?;
        self.forest.free_leaf(leaf)?;
        self.len -= 1;

        for node in path {
            if self.forest.contains_node(node) {
                self.relieve_underflow(node)?;
            }
        }
        self.collapse_root()
    }
}

impl<'a> IntoIterator for &'a FingerTree {
    type Item = Key;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
