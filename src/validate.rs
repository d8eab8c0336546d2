//! Full structural check of a forest rooted at one node.
//!
//! Walks the tree level by level and compares every stored pointer and
//! counter against what the walk observes. Meant for tests and debugging;
//! the cost is linear in the number of entities.

use std::collections::BTreeMap;
use std::fmt::Display as StdDisplay;

use crate::alloc::{Block1Id, Block2Id, ComponentId, GroupId, NodeId};
use crate::bounds;
use crate::error::TreeError;
use crate::forest::Forest;
use crate::layer::{Container, Linked, Span};
use crate::node::NodeKind;
use crate::Key;

macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err(TreeError::InvariantViolated(format!($($arg)+)));
        }
    };
}

/// Entity counts observed by [`Forest::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Census {
    /// Leaves, i.e. stored keys.
    pub leaves: usize,
    /// Internal nodes.
    pub internal: usize,
    /// Block1 units.
    pub block1: usize,
    /// Block2 units.
    pub block2: usize,
    /// Groups referenced by internal nodes.
    pub groups: usize,
    /// Components referenced by those groups.
    pub components: usize,
    /// Level of the root, 0 for an empty tree.
    pub height: u32,
}

#[derive(Default)]
struct GroupTally {
    level: u32,
    degree: usize,
    members: usize,
}

impl Forest {
    /// Check every structural invariant of the tree rooted at `root`.
    ///
    /// Verified: parent pointers and span lengths, degree sums at every
    /// layer, raw group degrees and member counts, component reference
    /// counts, the level-wide sibling chains against the in-order walk, mate
    /// symmetry and adjacency, non-empty containers, block capacities, and
    /// strictly increasing leaf keys. Every live entity must be reachable.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvariantViolated`] describing the first violation.
    pub fn validate(&self, root: Option<NodeId>) -> Result<Census, TreeError> {
        let mut census: Census = Census::default();
        let Some(root) = root else {
            ensure!(
                self.nodes.is_empty() && self.blocks1.is_empty() && self.blocks2.is_empty(),
                "empty tree still owns {} nodes",
                self.nodes.len()
            );
            ensure!(
                self.groups.is_empty() && self.components.is_empty(),
                "empty tree still owns {} groups",
                self.groups.len()
            );
            return Ok(census);
        };

        let root_record = self.nodes.get(root)?;
        ensure!(root_record.father.is_none(), "root {root} has a father");
        ensure!(!root_record.is_leaf(), "root {root} is a leaf");
        census.height = root_record.level;

        let mut tallies: BTreeMap<GroupId, GroupTally> = BTreeMap::new();
        let mut level_nodes: Vec<NodeId> = vec![root];
        let mut level: u32 = census.height;

        loop {
            self.check_chain(&level_nodes, "node")?;

            if level == 0 {
                let mut previous: Option<Key> = None;
                for &leaf in &level_nodes {
                    let record = self.nodes.get(leaf)?;
                    let Some(value) = record.value() else {
                        return Err(TreeError::InvariantViolated(format!("{leaf} at level 0 is internal")));
                    };
                    if let Some(before) = previous {
                        ensure!(before < value, "keys out of order: {before} then {value}");
                    }
                    previous = Some(value);
                }
                census.leaves = level_nodes.len();
                break;
            }

            let mut level_block2: Vec<Block2Id> = Vec::new();
            let mut level_block1: Vec<Block1Id> = Vec::new();
            let mut next: Vec<NodeId> = Vec::new();
            let capacity: usize = bounds::a(level).saturating_mul(2);

            for &node in &level_nodes {
                let record = self.nodes.get(node)?;
                ensure!(record.level == level, "{node} sits on level {level} but says {}", record.level);
                let NodeKind::Internal { degree, group, .. } = record.kind else {
                    return Err(TreeError::InvariantViolated(format!("leaf {node} above level 0")));
                };

                let blocks2: Vec<Block2Id> = self.span_members::<NodeId>(node)?;
                ensure!(!blocks2.is_empty(), "internal node {node} is empty");
                let threshold: usize = if self.peek_split_mode(node)? {
                    bounds::b_plus(level)
                } else {
                    bounds::f(level)
                };

                let mut node_degree: usize = 0;
                for &b2 in &blocks2 {
                    let blocks1: Vec<Block1Id> = self.span_members::<Block2Id>(b2)?;
                    ensure!(!blocks1.is_empty(), "{b2} is empty");

                    let mut b2_degree: usize = 0;
                    for &b1 in &blocks1 {
                        let children: Vec<NodeId> = self.span_members::<Block1Id>(b1)?;
                        ensure!(!children.is_empty(), "{b1} is empty");
                        ensure!(
                            children.len() <= capacity,
                            "{b1} holds {} nodes, over twice its capacity",
                            children.len()
                        );
                        for &child in &children {
                            let child_level: u32 = self.nodes.get(child)?.level;
                            ensure!(child_level + 1 == level, "{child} on level {child_level} under level {level}");
                        }
                        self.check_block1_mate(b1)?;
                        b2_degree += children.len();
                        next.extend(children);
                    }

                    let stored: usize = self.blocks2.get(b2)?.degree;
                    ensure!(stored == b2_degree, "{b2} degree {stored}, counted {b2_degree}");
                    ensure!(
                        b2_degree <= threshold.saturating_mul(2),
                        "{b2} degree {b2_degree} over twice its threshold {threshold}"
                    );
                    self.check_block2_mate(b2)?;
                    node_degree += b2_degree;
                    level_block1.extend(blocks1);
                }

                ensure!(degree == node_degree, "{node} degree {degree}, counted {node_degree}");
                let tally: &mut GroupTally = tallies.entry(group).or_default();
                tally.level = level;
                tally.degree += degree;
                tally.members += 1;
                level_block2.extend(blocks2);
            }

            self.check_chain(&level_block2, "block2")?;
            self.check_chain(&level_block1, "block1")?;
            census.internal += level_nodes.len();
            census.block2 += level_block2.len();
            census.block1 += level_block1.len();
            level_nodes = next;
            level -= 1;
        }

        let mut references: BTreeMap<ComponentId, usize> = BTreeMap::new();
        for (&group, tally) in &tallies {
            let entry = self.groups.get(group)?;
            ensure!(entry.level == tally.level, "{group} level {} holds level {} nodes", entry.level, tally.level);
            ensure!(
                entry.degree == tally.degree,
                "{group} degree {}, counted {}",
                entry.degree,
                tally.degree
            );
            ensure!(
                entry.members == tally.members,
                "{group} members {}, counted {}",
                entry.members,
                tally.members
            );
            *references.entry(entry.component).or_default() += 1;
        }
        for (&component, &count) in &references {
            let stored: usize = self.components.get(component)?.groups;
            ensure!(stored == count, "{component} counts {stored} groups, found {count}");
        }
        census.groups = tallies.len();
        census.components = references.len();

        ensure!(
            self.nodes.len() == census.leaves + census.internal,
            "{} live nodes, {} reachable",
            self.nodes.len(),
            census.leaves + census.internal
        );
        ensure!(self.blocks1.len() == census.block1, "unreachable block1 units");
        ensure!(self.blocks2.len() == census.block2, "unreachable block2 units");
        ensure!(self.groups.len() == census.groups, "unreferenced groups");
        ensure!(self.components.len() == census.components, "unreferenced components");
        Ok(census)
    }

    /// Children of `container` in span order, checking father pointers and
    /// that the span ends where its length says.
    fn span_members<C: Container + StdDisplay>(&self, container: C) -> Result<Vec<C::Child>, TreeError> {
        let span: Span<C::Child> = C::span(self, container)?;
        let mut out: Vec<C::Child> = Vec::with_capacity(span.len);
        let mut cursor: Option<C::Child> = span.first;
        while out.len() < span.len {
            let Some(child) = cursor else {
                return Err(TreeError::InvariantViolated(format!(
                    "{container} span ends after {} of {} children",
                    out.len(),
                    span.len
                )));
            };
            ensure!(
                C::father_of(self, child)? == Some(container),
                "child {} of {container} has another father",
                out.len()
            );
            out.push(child);
            cursor = C::Child::links(self, child)?.right;
        }
        ensure!(out.last().copied() == span.last, "{container} span last is off");
        Ok(out)
    }

    /// The in-order list of one level must match its sibling chain exactly.
    fn check_chain<H: Linked + StdDisplay>(&self, level: &[H], what: &str) -> Result<(), TreeError> {
        for (position, &entity) in level.iter().enumerate() {
            let links = H::links(self, entity)?;
            let expected_left: Option<H> = position.checked_sub(1).and_then(|i| level.get(i).copied());
            let expected_right: Option<H> = level.get(position + 1).copied();
            ensure!(links.left == expected_left, "{what} chain: {entity} has the wrong left sibling");
            ensure!(links.right == expected_right, "{what} chain: {entity} has the wrong right sibling");
        }
        Ok(())
    }

    fn check_block1_mate(&self, block1: Block1Id) -> Result<(), TreeError> {
        let record = self.blocks1.get(block1)?;
        if let Some(mate) = record.mate {
            let other = self.blocks1.get(mate)?;
            ensure!(other.mate == Some(block1), "{block1} and {mate} disagree on pairing");
            ensure!(other.father == record.father, "{block1} paired across block2 units");
            ensure!(
                record.links.left == Some(mate) || record.links.right == Some(mate),
                "{block1} paired with non-neighbour {mate}"
            );
        }
        Ok(())
    }

    fn check_block2_mate(&self, block2: Block2Id) -> Result<(), TreeError> {
        let record = self.blocks2.get(block2)?;
        if let Some(mate) = record.mate {
            let other = self.blocks2.get(mate)?;
            ensure!(other.mate == Some(block2), "{block2} and {mate} disagree on pairing");
            ensure!(other.node == record.node, "{block2} paired across nodes");
            ensure!(
                record.links.left == Some(mate) || record.links.right == Some(mate),
                "{block2} paired with non-neighbour {mate}"
            );
        }
        Ok(())
    }
}
