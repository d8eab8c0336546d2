//! Groups and components: the amortization layer over sibling nodes.
//!
//! Every internal node belongs to exactly one group. A group is a run of
//! adjacent same-level nodes with a shared degree budget: below
//! `4·F(L)` the group is in fusion mode and its Block2 units fill up to
//! `F(L)`; above it the group is in split mode and they may grow to `B⁺(L)`.
//!
//! Groups are retired lazily. [`Forest::group_multi_break`] only flips the
//! `valid` flags of the group and its component; each member node repairs
//! its own membership the next time [`Forest::resolve_group`] reads it.
//! This keeps the break O(1) no matter how many nodes the group spans.
//!
//! Components tie groups together across a break. A component lives while
//! at least one group refers to it, a group while it has members.

use crate::alloc::{Block2Id, ComponentId, GroupId, NodeId};
use crate::bounds;
use crate::error::TreeError;
use crate::forest::{Forest, NodeObserver, Scope};
use crate::layer::{Links, Span};
use crate::node::{MAX_BLOCK2_PER_NODE, NodeKind};
use crate::tracing_helpers::{debug_log, trace_log};

/// A run of adjacent same-level nodes sharing a degree budget.
#[derive(Debug, Clone)]
pub struct Group {
    pub(crate) level: u32,
    pub(crate) first: Option<NodeId>,
    pub(crate) last: Option<NodeId>,
    pub(crate) degree: usize,
    pub(crate) members: usize,
    pub(crate) component: ComponentId,
    pub(crate) valid: bool,
}

impl Group {
    /// Level of the member nodes.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Leftmost member.
    #[inline]
    #[must_use]
    pub const fn first(&self) -> Option<NodeId> {
        self.first
    }

    /// Rightmost member.
    #[inline]
    #[must_use]
    pub const fn last(&self) -> Option<NodeId> {
        self.last
    }

    /// Sum of the degrees of the member nodes.
    #[inline]
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Number of member nodes.
    #[inline]
    #[must_use]
    pub const fn members(&self) -> usize {
        self.members
    }

    /// Component the group belongs to.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> ComponentId {
        self.component
    }

    /// Whether the group has not been broken.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Validity token shared by groups.
#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) valid: bool,
    pub(crate) groups: usize,
}

impl Component {
    /// Whether the component has not been invalidated.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of groups referring to this component.
    #[inline]
    #[must_use]
    pub const fn groups(&self) -> usize {
        self.groups
    }
}

/// `(poor_node, rich_node, rich_on_right, rich_blocks)`.
type ShareRoles = (NodeId, NodeId, bool, Span<Block2Id>);

impl Forest {
    // ------------------------------------------------------------------
    //  Bookkeeping
    // ------------------------------------------------------------------

    /// Allocate an empty, valid group bound to `component`.
    pub(crate) fn new_group(&mut self, level: u32, component: ComponentId) -> Result<GroupId, TreeError> {
        let group: GroupId = self.groups.insert(Group {
            level,
            first: None,
            last: None,
            degree: 0,
            members: 0,
            component,
            valid: true,
        })?;
        self.components.get_mut(component)?.groups += 1;
        Ok(group)
    }

    /// Drop one group reference from `component`, freeing it at zero.
    fn release_component(&mut self, component: ComponentId) -> Result<(), TreeError> {
        let record: &mut Component = self.components.get_mut(component)?;
        record.groups = record.groups.checked_sub(1).ok_or(TreeError::DegreeUnderflow)?;
        if record.groups == 0 {
            self.components.remove(component)?;
        }
        Ok(())
    }

    fn set_node_group(&mut self, node: NodeId, group: GroupId) -> Result<(), TreeError> {
        match &mut self.nodes.get_mut(node)?.kind {
            NodeKind::Internal { group: slot, .. } => {
                *slot = group;
                Ok(())
            }
            NodeKind::Leaf { .. } => Err(TreeError::NotALeaf),
        }
    }

    fn stored_group(&self, node: NodeId) -> Result<GroupId, TreeError> {
        self.nodes.get(node)?.group().ok_or(TreeError::NotALeaf)
    }

    /// Take `node` out of its stored group. The group loses the node's
    /// degree and is freed with its last member; the node's group field is
    /// left dangling for the caller to overwrite.
    pub(crate) fn group_remove(&mut self, node: NodeId) -> Result<(), TreeError> {
        let record = self.nodes.get(node)?;
        let degree: usize = record.degree();
        let links: Links<NodeId> = record.links;
        let group: GroupId = self.stored_group(node)?;

        let entry: &mut Group = self.groups.get_mut(group)?;
        entry.members = entry.members.checked_sub(1).ok_or(TreeError::DegreeUnderflow)?;
        entry.degree = entry.degree.checked_sub(degree).ok_or(TreeError::DegreeUnderflow)?;

        if entry.members == 0 {
            let component: ComponentId = entry.component;
            self.groups.remove(group)?;
            self.release_component(component)?;
            trace_log!(group = %group, "released empty group");
        } else {
            if entry.first == Some(node) {
                entry.first = links.right;
            }
            if entry.last == Some(node) {
                entry.last = links.left;
            }
        }
        Ok(())
    }

    /// Move `node` into a fresh singleton group bound to `component`.
    fn regroup_alone(&mut self, node: NodeId, component: ComponentId) -> Result<GroupId, TreeError> {
        let record = self.nodes.get(node)?;
        let level: u32 = record.level;
        let degree: usize = record.degree();

        // Hold the component across the removal so it cannot be freed.
        self.components.get_mut(component)?.groups += 1;
        self.group_remove(node)?;
        let group: GroupId = self.new_group(level, component)?;
        self.release_component(component)?;

        let entry: &mut Group = self.groups.get_mut(group)?;
        entry.first = Some(node);
        entry.last = Some(node);
        entry.members = 1;
        entry.degree = degree;
        self.set_node_group(node, group)?;
        Ok(group)
    }

    /// Current group of `node`, repairing a stale membership first.
    ///
    /// | group | component | result |
    /// |-------|-----------|--------|
    /// | valid | valid | stored group |
    /// | valid | invalid | stored group, rebound to a new component |
    /// | invalid | invalid | new singleton group with a new component |
    /// | invalid | valid | new singleton group in the same component |
    ///
    /// # Errors
    ///
    /// [`TreeError::NotALeaf`] for leaves.
    pub fn resolve_group(&mut self, node: NodeId) -> Result<GroupId, TreeError> {
        let group: GroupId = self.stored_group(node)?;
        let entry: &Group = self.groups.get(group)?;
        let group_valid: bool = entry.valid;
        let component: ComponentId = entry.component;
        let component_valid: bool = self.components.get(component)?.valid;

        match (group_valid, component_valid) {
            (true, true) => Ok(group),

            (true, false) => {
                let fresh: ComponentId = self.new_component()?;
                self.groups.get_mut(group)?.component = fresh;
                self.components.get_mut(fresh)?.groups += 1;
                self.release_component(component)?;
                trace_log!(group = %group, component = %fresh, "group rebound to new component");
                Ok(group)
            }

            (false, false) => {
                let fresh: ComponentId = self.new_component()?;
                let group: GroupId = self.regroup_alone(node, fresh)?;
                trace_log!(node = %node, group = %group, "node left broken group");
                Ok(group)
            }

            (false, true) => {
                let group: GroupId = self.regroup_alone(node, component)?;
                trace_log!(node = %node, group = %group, "node left broken group");
                Ok(group)
            }
        }
    }

    /// Split mode of the stored group of `node`, without repairing it. A
    /// broken group reports the node's own degree.
    pub(crate) fn peek_split_mode(&self, node: NodeId) -> Result<bool, TreeError> {
        let record = self.nodes.get(node)?;
        let limit: usize = bounds::group_limit(record.level);
        let group: GroupId = self.stored_group(node)?;
        let entry: &Group = self.groups.get(group)?;
        let live: bool = entry.valid && self.components.get(entry.component)?.valid;
        Ok(if live { entry.degree > limit } else { record.degree() > limit })
    }

    /// Add `middle`, the right neighbour of `left`, to `left`'s group.
    ///
    /// # Errors
    ///
    /// [`TreeError::NotAdjacent`] if `middle` is not right after `left`.
    pub fn group_add(&mut self, left: NodeId, middle: NodeId) -> Result<(), TreeError> {
        if self.nodes.get(left)?.links.right != Some(middle) {
            return Err(TreeError::NotAdjacent);
        }
        let group: GroupId = self.resolve_group(left)?;
        let degree: usize = self.nodes.get(middle)?.degree();

        self.group_remove(middle)?;
        let entry: &mut Group = self.groups.get_mut(group)?;
        entry.members += 1;
        entry.degree += degree;
        if entry.last == Some(left) {
            entry.last = Some(middle);
        }
        self.set_node_group(middle, group)
    }

    // ------------------------------------------------------------------
    //  Queries
    // ------------------------------------------------------------------

    /// Whether `group` exceeds `4·F(L)` and runs in split mode.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn group_is_split(&self, group: GroupId) -> Result<bool, TreeError> {
        let entry: &Group = self.groups.get(group)?;
        Ok(entry.degree > bounds::group_limit(entry.level))
    }

    /// Whether `group` is a single node holding a single Block1.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn group_has_only_one_block1(&self, group: GroupId) -> Result<bool, TreeError> {
        let entry: &Group = self.groups.get(group)?;
        if entry.members != 1 {
            return Ok(false);
        }
        let Some(node) = entry.first else {
            return Ok(false);
        };
        let Some(blocks) = self.nodes.get(node)?.blocks() else {
            return Ok(false);
        };
        if blocks.len != 1 {
            return Ok(false);
        }
        let Some(b2) = blocks.first else {
            return Ok(false);
        };
        Ok(self.blocks2.get(b2)?.blocks.len == 1)
    }

    /// Member of `receiver` adjacent to the single node of `donor`, and
    /// whether it sits on the donor's right.
    fn facing_member(&self, donor: GroupId, receiver: GroupId) -> Result<Option<(NodeId, NodeId, bool)>, TreeError> {
        let donor_entry: &Group = self.groups.get(donor)?;
        let Some(donor_node) = donor_entry.first else {
            return Ok(None);
        };
        let receiver_entry: &Group = self.groups.get(receiver)?;
        let links: Links<NodeId> = self.nodes.get(donor_node)?.links;

        if links.left.is_some() && links.left == receiver_entry.last {
            if let Some(node) = links.left {
                return Ok(Some((donor_node, node, false)));
            }
        }
        if links.right.is_some() && links.right == receiver_entry.first {
            if let Some(node) = links.right {
                return Ok(Some((donor_node, node, true)));
            }
        }
        Ok(None)
    }

    /// Whether the adjacent groups `a` and `b` can be fused, with either one
    /// as the donor.
    ///
    /// Both groups must be distinct, valid and on the same level, neither in
    /// split mode, with a combined degree of at most `4·F(L)`. The donor is a
    /// single node holding one Block2, the receiving node holds at most
    /// [`MAX_BLOCK2_PER_NODE`], and both have the same parent node. A root
    /// has no parent and never fuses.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn group_can_be_fused(&self, a: GroupId, b: GroupId) -> Result<bool, TreeError> {
        Ok(self.fusion_roles(a, b)?.is_some())
    }

    /// `(donor, receiver)` for a fuse of `a` and `b`, preferring `a` as the
    /// donor.
    fn fusion_roles(&self, a: GroupId, b: GroupId) -> Result<Option<(GroupId, GroupId)>, TreeError> {
        if self.fusable_into(a, b)? {
            return Ok(Some((a, b)));
        }
        if self.fusable_into(b, a)? {
            return Ok(Some((b, a)));
        }
        Ok(None)
    }

    fn fusable_into(&self, donor: GroupId, receiver: GroupId) -> Result<bool, TreeError> {
        if donor == receiver {
            return Ok(false);
        }
        let a: &Group = self.groups.get(donor)?;
        let b: &Group = self.groups.get(receiver)?;
        let live: bool = a.valid
            && b.valid
            && self.components.get(a.component)?.valid
            && self.components.get(b.component)?.valid;
        if !live || a.level != b.level || a.members != 1 {
            return Ok(false);
        }
        if self.group_is_split(donor)? || self.group_is_split(receiver)? {
            return Ok(false);
        }
        if a.degree.saturating_add(b.degree) > bounds::group_limit(a.level) {
            return Ok(false);
        }

        let Some((donor_node, receiving, _)) = self.facing_member(donor, receiver)? else {
            return Ok(false);
        };
        if self.nodes.get(donor_node)?.block2_count() != 1
            || self.nodes.get(receiving)?.block2_count() > MAX_BLOCK2_PER_NODE
        {
            return Ok(false);
        }

        let parent = self.node_parent(donor_node)?;
        Ok(parent.is_some() && parent == self.node_parent(receiving)?)
    }

    // ------------------------------------------------------------------
    //  Restructuring
    // ------------------------------------------------------------------

    /// Pair `block2` with its inward neighbour `other` when exactly one of
    /// them is full and both are unpaired.
    fn pair_if_unbalanced(&mut self, block2: Block2Id, other: Block2Id) -> Result<bool, TreeError> {
        if self.blocks2.get(block2)?.mate.is_some() || self.blocks2.get(other)?.mate.is_some() {
            return Ok(false);
        }
        if self.block2_is_full(block2)? == self.block2_is_full(other)? {
            return Ok(false);
        }
        self.block2_pair(block2, other)?;
        Ok(true)
    }

    /// Fuse the adjacent groups `a` and `b`: the single-node group among them
    /// (`a` when both qualify) is folded into the other.
    ///
    /// When the donor holds one Block1 it moves into the receiving node's
    /// facing Block2; otherwise the donor's Block2 moves into the receiving
    /// node as a new boundary unit. Either way the donor node empties, is
    /// reported to `observer` and freed. Returns the Block2 that received
    /// the donor's contents.
    ///
    /// # Errors
    ///
    /// [`TreeError::CannotFuse`] unless [`Forest::group_can_be_fused`] holds.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, observer)))]
    pub fn group_fuse<O: NodeObserver + ?Sized>(
        &mut self,
        a: GroupId,
        b: GroupId,
        observer: &mut O,
    ) -> Result<Block2Id, TreeError> {
        let Some((donor, receiver)) = self.fusion_roles(a, b)? else {
            return Err(TreeError::CannotFuse);
        };
        let Some((donor_node, receiving, receiver_on_right)) = self.facing_member(donor, receiver)? else {
            return Err(TreeError::CannotFuse);
        };
        let what: Block2Id = self
            .nodes
            .get(donor_node)?
            .blocks()
            .and_then(|span| span.first)
            .ok_or(TreeError::CannotFuse)?;
        let receiving_blocks: Span<Block2Id> =
            self.nodes.get(receiving)?.blocks().ok_or(TreeError::NotALeaf)?;

        if self.blocks2.get(what)?.blocks.len == 1 {
            let lone = self
                .blocks2
                .get(what)?
                .blocks
                .first
                .ok_or(TreeError::EmptyContainer)?;
            let to: Block2Id = if receiver_on_right {
                receiving_blocks.first
            } else {
                receiving_blocks.last
            }
            .ok_or(TreeError::EmptyContainer)?;

            self.rehome::<Block2Id>(what, to, lone, receiver_on_right)?;
            self.release_empty(Scope::Block2(what), observer)?;

            let links: Links<Block2Id> = self.blocks2.get(to)?.links;
            let inward: Option<Block2Id> = if receiver_on_right { links.right } else { links.left };
            if let Some(other) = inward {
                if self.blocks2.get(other)?.node == receiving {
                    self.pair_if_unbalanced(to, other)?;
                }
            }
            if self.blocks2.get(to)?.pending.is_some() && self.block2_is_full(to)? {
                self.blocks2.get_mut(to)?.pending = None;
            }
            debug_log!(donor = %donor_node, into = %to, "fused single block1");
            return Ok(to);
        }

        self.rehome::<NodeId>(donor_node, receiving, what, receiver_on_right)?;
        self.release_empty(Scope::Node(donor_node), observer)?;
        self.block2_unpair(what)?;
        self.blocks2.get_mut(what)?.pending = None;

        let links: Links<Block2Id> = self.blocks2.get(what)?.links;
        let inward: Option<Block2Id> = if receiver_on_right { links.right } else { links.left };
        if let Some(other) = inward {
            if self.blocks2.get(other)?.node == receiving && !self.pair_if_unbalanced(what, other)? {
                let other_paired: bool = self.blocks2.get(other)?.mate.is_some();
                if other_paired && !self.block2_is_full(what)? {
                    self.block2_set_pending(what, other)?;
                }
            }
        }
        debug_log!(donor = %donor_node, into = %what, "fused block2");
        Ok(what)
    }

    /// Nodes and orientation of a share where `poor` borrows from `rich`.
    fn share_roles(&self, poor: GroupId, rich: GroupId) -> Result<Option<ShareRoles>, TreeError> {
        if poor == rich || self.groups.get(poor)?.members != 1 || self.groups.get(rich)?.members != 1 {
            return Ok(None);
        }
        if !self.group_has_only_one_block1(poor)? {
            return Ok(None);
        }
        let Some((poor_node, rich_node, rich_on_right)) = self.facing_member(poor, rich)? else {
            return Ok(None);
        };
        let rich_blocks: Span<Block2Id> =
            self.nodes.get(rich_node)?.blocks().ok_or(TreeError::NotALeaf)?;
        if rich_blocks.len < 2 {
            return Ok(None);
        }
        Ok(Some((poor_node, rich_node, rich_on_right, rich_blocks)))
    }

    /// Let the adjacent single-node groups `a` and `b` share: the one holding
    /// a single Block1 (`a` when both do) borrows a whole Block2 from the
    /// other, which must have at least two.
    ///
    /// The borrowed Block2 loses its pairings and the lone Block1 joins it,
    /// so the poor node ends with one Block2 again. Returns that Block2.
    ///
    /// # Errors
    ///
    /// [`TreeError::CannotShare`] if the groups do not qualify.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, observer)))]
    pub fn group_share<O: NodeObserver + ?Sized>(
        &mut self,
        a: GroupId,
        b: GroupId,
        observer: &mut O,
    ) -> Result<Block2Id, TreeError> {
        let roles = match self.share_roles(a, b)? {
            Some(roles) => roles,
            None => self.share_roles(b, a)?.ok_or(TreeError::CannotShare)?,
        };
        let (poor_node, rich_node, rich_on_right, rich_blocks) = roles;

        let old: Block2Id = self
            .nodes
            .get(poor_node)?
            .blocks()
            .and_then(|span| span.first)
            .ok_or(TreeError::CannotShare)?;
        let lone = self.blocks2.get(old)?.blocks.first.ok_or(TreeError::EmptyContainer)?;
        let borrowed: Block2Id = if rich_on_right {
            rich_blocks.first
        } else {
            rich_blocks.last
        }
        .ok_or(TreeError::EmptyContainer)?;

        self.rehome::<NodeId>(rich_node, poor_node, borrowed, !rich_on_right)?;
        self.block2_unpair(borrowed)?;
        self.block2_forget_pending(borrowed)?;

        self.rehome::<Block2Id>(old, borrowed, lone, rich_on_right)?;
        self.release_empty(Scope::Block2(old), observer)?;
        debug_log!(poor = %poor_node, rich = %rich_node, block2 = %borrowed, "shared block2");
        Ok(borrowed)
    }

    /// Retire `group` in O(1): invalidate it and its component, and bind it
    /// to the component of the parent node's group (or a fresh one at the
    /// root). Members move out lazily through [`Forest::resolve_group`].
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] on a freed handle.
    pub fn group_multi_break(&mut self, group: GroupId) -> Result<(), TreeError> {
        let entry: &mut Group = self.groups.get_mut(group)?;
        entry.valid = false;
        let old: ComponentId = entry.component;
        let first: Option<NodeId> = entry.first;
        self.components.get_mut(old)?.valid = false;

        let parent: Option<NodeId> = match first {
            Some(node) => self.node_parent(node)?,
            None => None,
        };
        let target: ComponentId = match parent {
            Some(node) => {
                let parent_group: GroupId = self.resolve_group(node)?;
                self.groups.get(parent_group)?.component
            }
            None => self.new_component()?,
        };

        self.components.get_mut(target)?.groups += 1;
        self.groups.get_mut(group)?.component = target;
        self.release_component(old)?;
        debug_log!(group = %group, component = %target, "group broken");
        Ok(())
    }

    /// Break the group of `node` if its first and last members no longer
    /// share a Block1. Leaves carry no group.
    pub(crate) fn retire_if_straddling(&mut self, node: NodeId) -> Result<(), TreeError> {
        let Some(group) = self.nodes.get(node)?.group() else {
            return Ok(());
        };
        let entry: &Group = self.groups.get(group)?;
        if !entry.valid || entry.members <= 1 {
            return Ok(());
        }
        let (Some(first), Some(last)) = (entry.first, entry.last) else {
            return Ok(());
        };
        if self.nodes.get(first)?.father != self.nodes.get(last)?.father {
            self.group_multi_break(group)?;
        }
        Ok(())
    }
}
