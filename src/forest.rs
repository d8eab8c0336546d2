//! The arena-backed structure shared by every layer.
//!
//! [`Forest`] owns one arena per entity kind. All structural primitives are
//! `Forest` methods, spread over the layer modules ([`node`](crate::node),
//! [`block1`](crate::block1), [`block2`](crate::block2),
//! [`group`](crate::group)); this module holds creation, the single
//! degree-propagation helper and the emptied-container cascade.
//!
//! # Emptied nodes
//!
//! When a cascade leaves an internal node without Block2 units, the forest
//! removes it from its group, unlinks it from its parent Block1 (which may
//! cascade further up) and only then reports it through
//! [`NodeObserver::on_node_emptied`]. The node is freed as soon as the
//! callback returns, so the observer must not keep the handle.

use crate::alloc::{Arena, Block1Id, Block2Id, ComponentId, GroupId, NodeId};
use crate::block1::Block1;
use crate::block2::Block2;
use crate::error::TreeError;
use crate::group::{Component, Group};
use crate::layer::{Links, Span};
use crate::node::{Node, NodeKind};
use crate::tracing_helpers::{debug_log, trace_log};
use crate::Key;

// ============================================================================
//  Observer
// ============================================================================

/// Receives nodes that a structural cascade emptied.
pub trait NodeObserver {
    /// Called once per emptied node, after it was unlinked from its parent
    /// and its group, right before it is freed.
    fn on_node_emptied(&mut self, forest: &Forest, node: NodeId);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl NodeObserver for NoopObserver {
    fn on_node_emptied(&mut self, _forest: &Forest, _node: NodeId) {}
}

// ============================================================================
//  Degree bookkeeping
// ============================================================================

/// Where a degree change enters the ancestor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// A Block1 gained or lost children.
    Block1(Block1Id),
    /// A Block2 gained or lost descendant nodes.
    Block2(Block2Id),
    /// An internal node gained or lost descendant nodes.
    Node(NodeId),
}

/// A signed change to a degree counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// Increase by the given amount.
    Grow(usize),
    /// Decrease by the given amount.
    Shrink(usize),
}

impl Delta {
    fn apply(self, value: usize) -> Result<usize, TreeError> {
        match self {
            Self::Grow(n) => Ok(value.saturating_add(n)),
            Self::Shrink(n) => value.checked_sub(n).ok_or(TreeError::DegreeUnderflow),
        }
    }
}

// ============================================================================
//  Forest
// ============================================================================

/// Every entity of one finger search tree.
#[derive(Debug, Default)]
pub struct Forest {
    pub(crate) nodes: Arena<NodeId, Node>,
    pub(crate) blocks1: Arena<Block1Id, Block1>,
    pub(crate) blocks2: Arena<Block2Id, Block2>,
    pub(crate) groups: Arena<GroupId, Group>,
    pub(crate) components: Arena<ComponentId, Component>,
}

impl Forest {
    /// Create an empty forest.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Arena::new(),
            blocks1: Arena::new(),
            blocks2: Arena::new(),
            groups: Arena::new(),
            components: Arena::new(),
        }
    }

    // ------------------------------------------------------------------
    //  Access
    // ------------------------------------------------------------------

    /// Node record behind `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `id` was freed.
    #[inline]
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(id)
    }

    /// Block1 record behind `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `id` was freed.
    #[inline]
    pub fn block1(&self, id: Block1Id) -> Result<&Block1, TreeError> {
        self.blocks1.get(id)
    }

    /// Block2 record behind `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `id` was freed.
    #[inline]
    pub fn block2(&self, id: Block2Id) -> Result<&Block2, TreeError> {
        self.blocks2.get(id)
    }

    /// Group record behind `id`, as stored (no lazy repair).
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `id` was freed.
    #[inline]
    pub fn group(&self, id: GroupId) -> Result<&Group, TreeError> {
        self.groups.get(id)
    }

    /// Component record behind `id`.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if `id` was freed.
    #[inline]
    pub fn component(&self, id: ComponentId) -> Result<&Component, TreeError> {
        self.components.get(id)
    }

    /// Whether `id` names a live node.
    #[inline]
    #[must_use]
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Number of live nodes, leaves included.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live Block1 units.
    #[must_use]
    pub const fn block1_count(&self) -> usize {
        self.blocks1.len()
    }

    /// Number of live Block2 units.
    #[must_use]
    pub const fn block2_count(&self) -> usize {
        self.blocks2.len()
    }

    /// Number of live groups.
    #[must_use]
    pub const fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of live components.
    #[must_use]
    pub const fn component_count(&self) -> usize {
        self.components.len()
    }

    // ------------------------------------------------------------------
    //  Creation
    // ------------------------------------------------------------------

    /// Allocate a detached leaf holding `value`.
    ///
    /// # Errors
    ///
    /// [`TreeError::ArenaFull`] if the node arena is exhausted.
    pub fn create_leaf(&mut self, value: Key) -> Result<NodeId, TreeError> {
        self.nodes.insert(Node {
            level: 0,
            links: Links::default(),
            father: None,
            kind: NodeKind::Leaf { value },
        })
    }

    /// Allocate a detached, empty internal node at `level` (at least 1),
    /// together with its own single-node group and component.
    ///
    /// The node is empty until a Block2 is attached; callers must fill it
    /// before the next cascade can see it.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotALeaf`] for `level == 0`, [`TreeError::ArenaFull`] if
    /// an arena is exhausted.
    pub fn create_internal(&mut self, level: u32) -> Result<NodeId, TreeError> {
        if level == 0 {
            return Err(TreeError::NotALeaf);
        }

        let component: ComponentId = self.new_component()?;
        let group: GroupId = self.new_group(level, component)?;
        let node: NodeId = self.nodes.insert(Node {
            level,
            links: Links::default(),
            father: None,
            kind: NodeKind::Internal {
                blocks: Span::empty(),
                degree: 0,
                group,
            },
        })?;

        let record: &mut Group = self.groups.get_mut(group)?;
        record.first = Some(node);
        record.last = Some(node);
        record.members = 1;
        Ok(node)
    }

    /// Allocate an empty Block1 destined for `father`. It joins the
    /// structure through [`Forest::block2_add`].
    ///
    /// # Errors
    ///
    /// [`TreeError::ArenaFull`] if the arena is exhausted.
    pub fn create_block1(&mut self, father: Block2Id) -> Result<Block1Id, TreeError> {
        self.blocks1.insert(Block1 {
            links: Links::default(),
            mate: None,
            father,
            children: Span::empty(),
        })
    }

    /// Allocate an empty Block2 destined for `node`. It joins the structure
    /// through [`Forest::node_add`].
    ///
    /// # Errors
    ///
    /// [`TreeError::ArenaFull`] if the arena is exhausted.
    pub fn create_block2(&mut self, node: NodeId) -> Result<Block2Id, TreeError> {
        self.blocks2.insert(Block2 {
            links: Links::default(),
            mate: None,
            pending: None,
            node,
            blocks: Span::empty(),
            degree: 0,
        })
    }

    pub(crate) fn new_component(&mut self) -> Result<ComponentId, TreeError> {
        self.components.insert(Component {
            valid: true,
            groups: 0,
        })
    }

    /// Free a leaf that is no longer in any Block1.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotALeaf`] for internal nodes and
    /// [`TreeError::CorruptLink`] if the leaf is still attached.
    pub fn free_leaf(&mut self, leaf: NodeId) -> Result<Key, TreeError> {
        let record: &Node = self.nodes.get(leaf)?;
        let NodeKind::Leaf { value } = record.kind else {
            return Err(TreeError::NotALeaf);
        };
        if record.father.is_some() {
            return Err(TreeError::CorruptLink("freeing an attached leaf"));
        }
        self.nodes.remove(leaf)?;
        Ok(value)
    }

    // ------------------------------------------------------------------
    //  Degree propagation
    // ------------------------------------------------------------------

    /// Push a degree change from `scope` up through the enclosing Block2,
    /// node and that node's group.
    ///
    /// Block1 degree is its child count and is kept by the span itself, so a
    /// `Block1` scope starts at the father Block2. The group is updated as
    /// stored; lazy repair moves the node's whole degree when it happens.
    pub(crate) fn apply_degree_delta(&mut self, scope: Scope, delta: Delta) -> Result<(), TreeError> {
        let mut next: Option<Scope> = Some(scope);
        while let Some(current) = next {
            next = match current {
                Scope::Block1(id) => Some(Scope::Block2(self.blocks1.get(id)?.father)),

                Scope::Block2(id) => {
                    let record: &mut Block2 = self.blocks2.get_mut(id)?;
                    record.degree = delta.apply(record.degree)?;
                    Some(Scope::Node(record.node))
                }

                Scope::Node(id) => {
                    let NodeKind::Internal { degree, group, .. } = &mut self.nodes.get_mut(id)?.kind
                    else {
                        return Err(TreeError::NotALeaf);
                    };
                    *degree = delta.apply(*degree)?;
                    let group: GroupId = *group;
                    let record: &mut Group = self.groups.get_mut(group)?;
                    record.degree = delta.apply(record.degree)?;
                    None
                }
            };
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    //  Emptied-container cascade
    // ------------------------------------------------------------------

    /// Remove `start` if it became empty, then its father if that became
    /// empty in turn, and so on up to the first container that still has
    /// children. Runs as a loop; the depth is bounded by the tree height.
    pub(crate) fn release_empty<O: NodeObserver + ?Sized>(
        &mut self,
        start: Scope,
        observer: &mut O,
    ) -> Result<(), TreeError> {
        let mut next: Option<Scope> = Some(start);
        while let Some(current) = next {
            next = match current {
                Scope::Block1(id) => {
                    let record: &Block1 = self.blocks1.get(id)?;
                    if record.children.is_empty() {
                        let father: Block2Id = record.father;
                        self.block1_unpair(id)?;
                        self.detach::<Block2Id>(father, id)?;
                        self.blocks1.remove(id)?;
                        trace_log!(block1 = %id, "released empty block1");
                        Some(Scope::Block2(father))
                    } else {
                        None
                    }
                }

                Scope::Block2(id) => {
                    let record: &Block2 = self.blocks2.get(id)?;
                    if record.blocks.is_empty() {
                        let node: NodeId = record.node;
                        self.block2_unpair(id)?;
                        self.block2_forget_pending(id)?;
                        self.detach::<NodeId>(node, id)?;
                        self.blocks2.remove(id)?;
                        trace_log!(block2 = %id, "released empty block2");
                        Some(Scope::Node(node))
                    } else {
                        None
                    }
                }

                Scope::Node(id) => {
                    let record: &Node = self.nodes.get(id)?;
                    let emptied: bool = matches!(
                        record.kind,
                        NodeKind::Internal { blocks, .. } if blocks.is_empty()
                    );
                    if emptied {
                        let father: Option<Block1Id> = record.father;
                        self.group_remove(id)?;
                        if let Some(block) = father {
                            self.detach::<Block1Id>(block, id)?;
                            self.nodes.get_mut(id)?.father = None;
                        }
                        debug_log!(node = %id, "node emptied");
                        observer.on_node_emptied(self, id);
                        self.nodes.remove(id)?;
                        father.map(Scope::Block1)
                    } else {
                        None
                    }
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Fail fast in tests")]
mod tests {
    use super::*;

    /// Level-1 node with one Block2 holding one Block1 holding `values`.
    fn single_block_node(forest: &mut Forest, values: &[Key]) -> (NodeId, Block2Id, Block1Id) {
        let node: NodeId = forest.create_internal(1).unwrap();
        let b2: Block2Id = forest.create_block2(node).unwrap();
        forest.node_add(node, None, b2, None).unwrap();
        let b1: Block1Id = forest.create_block1(b2).unwrap();
        forest.block2_add(b2, None, b1, None).unwrap();

        let mut last: Option<NodeId> = None;
        for &value in values {
            let leaf: NodeId = forest.create_leaf(value).unwrap();
            forest.block1_add(b1, last, leaf, None).unwrap();
            last = Some(leaf);
        }
        (node, b2, b1)
    }

    #[derive(Default)]
    struct Recorder(Vec<NodeId>);

    impl NodeObserver for Recorder {
        fn on_node_emptied(&mut self, forest: &Forest, node: NodeId) {
            // Already unlinked, still readable.
            assert!(forest.node(node).unwrap().father().is_none());
            self.0.push(node);
        }
    }

    #[test]
    fn test_degrees_propagate_to_group() {
        let mut forest: Forest = Forest::new();
        let (node, b2, b1) = single_block_node(&mut forest, &[1, 2, 3]);

        assert_eq!(forest.block1(b1).unwrap().degree(), 3);
        assert_eq!(forest.block2(b2).unwrap().degree(), 3);
        assert_eq!(forest.node(node).unwrap().degree(), 3);
        let group: GroupId = forest.node(node).unwrap().group().unwrap();
        assert_eq!(forest.group(group).unwrap().degree(), 3);
    }

    #[test]
    fn test_shrink_below_zero_is_an_error() {
        let mut forest: Forest = Forest::new();
        let (_, b2, _) = single_block_node(&mut forest, &[1]);
        let err: TreeError = forest
            .apply_degree_delta(Scope::Block2(b2), Delta::Shrink(5))
            .unwrap_err();
        assert_eq!(err, TreeError::DegreeUnderflow);
    }

    #[test]
    fn test_removing_last_leaf_releases_everything() {
        let mut forest: Forest = Forest::new();
        let (node, _, b1) = single_block_node(&mut forest, &[7]);
        let leaf: NodeId = forest.block1(b1).unwrap().first().unwrap();

        let mut recorder: Recorder = Recorder::default();
        forest.block1_remove(b1, leaf, &mut recorder).unwrap();
        forest.free_leaf(leaf).unwrap();

        assert_eq!(recorder.0, vec![node]);
        assert_eq!(forest.node_count(), 0);
        assert_eq!(forest.block1_count(), 0);
        assert_eq!(forest.block2_count(), 0);
        assert_eq!(forest.group_count(), 0);
        assert_eq!(forest.component_count(), 0);
    }

    #[test]
    fn test_free_leaf_rejects_attached_leaf() {
        let mut forest: Forest = Forest::new();
        let (_, _, b1) = single_block_node(&mut forest, &[7]);
        let leaf: NodeId = forest.block1(b1).unwrap().first().unwrap();
        assert!(matches!(forest.free_leaf(leaf), Err(TreeError::CorruptLink(_))));
    }

    #[test]
    fn test_internal_level_zero_rejected() {
        let mut forest: Forest = Forest::new();
        assert_eq!(forest.create_internal(0).unwrap_err(), TreeError::NotALeaf);
    }
}
