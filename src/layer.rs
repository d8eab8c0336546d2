//! Generic "container of linked children" plumbing.
//!
//! The three structural layers (Block1 holds nodes, Block2 holds Block1s,
//! an internal node holds Block2s) share one shape: an ordered run of
//! children that is a contiguous slice of a level-wide sibling chain. The
//! container only records the two ends of its slice and its length.
//!
//! Three primitives cover every structural edit:
//!
//! - [`Forest::attach`] splices a fresh child into the chain and the span,
//! - [`Forest::detach`] unsplices it,
//! - [`Forest::rehome`] moves a boundary child into the adjacent container
//!   without touching the chain at all.
//!
//! Each one pushes the resulting degree change up through the ancestors in a
//! single [`Forest::apply_degree_delta`] call.

use crate::alloc::{Block1Id, Block2Id, Handle, NodeId};
use crate::error::TreeError;
use crate::forest::{Delta, Forest, Scope};
use crate::node::NodeKind;
use crate::{EMPTY_MAX, EMPTY_MIN, Key};

// ============================================================================
//  Links and spans
// ============================================================================

/// Left and right siblings in a level-wide chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Links<H> {
    /// Previous entity in key order.
    pub left: Option<H>,
    /// Next entity in key order.
    pub right: Option<H>,
}

impl<H> Default for Links<H> {
    fn default() -> Self {
        Self {
            left: None,
            right: None,
        }
    }
}

/// The slice of a sibling chain owned by one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<H> {
    /// Leftmost child.
    pub first: Option<H>,
    /// Rightmost child.
    pub last: Option<H>,
    /// Number of children.
    pub len: usize,
}

impl<H> Span<H> {
    /// A span with no children.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            first: None,
            last: None,
            len: 0,
        }
    }

    /// Whether the span has no children.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ============================================================================
//  Layer traits
// ============================================================================

/// An entity that sits in a sibling chain.
pub(crate) trait Linked: Handle {
    fn links(forest: &Forest, id: Self) -> Result<Links<Self>, TreeError>;

    fn links_mut(forest: &mut Forest, id: Self) -> Result<&mut Links<Self>, TreeError>;

    /// Smallest key below this entity, `EMPTY_MIN` when empty.
    fn min_value(forest: &Forest, id: Self) -> Result<Key, TreeError>;

    /// Largest key below this entity, `EMPTY_MAX` when empty.
    fn max_value(forest: &Forest, id: Self) -> Result<Key, TreeError>;
}

/// An entity that owns a span of children.
pub(crate) trait Container: Handle {
    type Child: Linked;

    fn span(forest: &Forest, id: Self) -> Result<Span<Self::Child>, TreeError>;

    fn span_mut(forest: &mut Forest, id: Self) -> Result<&mut Span<Self::Child>, TreeError>;

    /// Degree a child contributes to this container.
    fn weight(forest: &Forest, child: Self::Child) -> Result<usize, TreeError>;

    fn father_of(forest: &Forest, child: Self::Child) -> Result<Option<Self>, TreeError>;

    fn adopt(forest: &mut Forest, id: Self, child: Self::Child) -> Result<(), TreeError>;

    fn scope(id: Self) -> Scope;
}

impl Linked for NodeId {
    fn links(forest: &Forest, id: Self) -> Result<Links<Self>, TreeError> {
        Ok(forest.nodes.get(id)?.links)
    }

    fn links_mut(forest: &mut Forest, id: Self) -> Result<&mut Links<Self>, TreeError> {
        Ok(&mut forest.nodes.get_mut(id)?.links)
    }

    fn min_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.node_min(id)
    }

    fn max_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.node_max(id)
    }
}

impl Linked for Block1Id {
    fn links(forest: &Forest, id: Self) -> Result<Links<Self>, TreeError> {
        Ok(forest.blocks1.get(id)?.links)
    }

    fn links_mut(forest: &mut Forest, id: Self) -> Result<&mut Links<Self>, TreeError> {
        Ok(&mut forest.blocks1.get_mut(id)?.links)
    }

    fn min_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.container_min(id)
    }

    fn max_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.container_max(id)
    }
}

impl Linked for Block2Id {
    fn links(forest: &Forest, id: Self) -> Result<Links<Self>, TreeError> {
        Ok(forest.blocks2.get(id)?.links)
    }

    fn links_mut(forest: &mut Forest, id: Self) -> Result<&mut Links<Self>, TreeError> {
        Ok(&mut forest.blocks2.get_mut(id)?.links)
    }

    fn min_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.container_min(id)
    }

    fn max_value(forest: &Forest, id: Self) -> Result<Key, TreeError> {
        forest.container_max(id)
    }
}

impl Container for Block1Id {
    type Child = NodeId;

    fn span(forest: &Forest, id: Self) -> Result<Span<NodeId>, TreeError> {
        Ok(forest.blocks1.get(id)?.children)
    }

    fn span_mut(forest: &mut Forest, id: Self) -> Result<&mut Span<NodeId>, TreeError> {
        Ok(&mut forest.blocks1.get_mut(id)?.children)
    }

    fn weight(_forest: &Forest, _child: NodeId) -> Result<usize, TreeError> {
        Ok(1)
    }

    fn father_of(forest: &Forest, child: NodeId) -> Result<Option<Self>, TreeError> {
        Ok(forest.nodes.get(child)?.father)
    }

    fn adopt(forest: &mut Forest, id: Self, child: NodeId) -> Result<(), TreeError> {
        forest.nodes.get_mut(child)?.father = Some(id);
        Ok(())
    }

    fn scope(id: Self) -> Scope {
        Scope::Block1(id)
    }
}

impl Container for Block2Id {
    type Child = Block1Id;

    fn span(forest: &Forest, id: Self) -> Result<Span<Block1Id>, TreeError> {
        Ok(forest.blocks2.get(id)?.blocks)
    }

    fn span_mut(forest: &mut Forest, id: Self) -> Result<&mut Span<Block1Id>, TreeError> {
        Ok(&mut forest.blocks2.get_mut(id)?.blocks)
    }

    fn weight(forest: &Forest, child: Block1Id) -> Result<usize, TreeError> {
        Ok(forest.blocks1.get(child)?.children.len)
    }

    fn father_of(forest: &Forest, child: Block1Id) -> Result<Option<Self>, TreeError> {
        Ok(Some(forest.blocks1.get(child)?.father))
    }

    fn adopt(forest: &mut Forest, id: Self, child: Block1Id) -> Result<(), TreeError> {
        forest.blocks1.get_mut(child)?.father = id;
        Ok(())
    }

    fn scope(id: Self) -> Scope {
        Scope::Block2(id)
    }
}

impl Container for NodeId {
    type Child = Block2Id;

    fn span(forest: &Forest, id: Self) -> Result<Span<Block2Id>, TreeError> {
        match &forest.nodes.get(id)?.kind {
            NodeKind::Internal { blocks, .. } => Ok(*blocks),
            NodeKind::Leaf { .. } => Err(TreeError::NotALeaf),
        }
    }

    fn span_mut(forest: &mut Forest, id: Self) -> Result<&mut Span<Block2Id>, TreeError> {
        match &mut forest.nodes.get_mut(id)?.kind {
            NodeKind::Internal { blocks, .. } => Ok(blocks),
            NodeKind::Leaf { .. } => Err(TreeError::NotALeaf),
        }
    }

    fn weight(forest: &Forest, child: Block2Id) -> Result<usize, TreeError> {
        Ok(forest.blocks2.get(child)?.degree)
    }

    fn father_of(forest: &Forest, child: Block2Id) -> Result<Option<Self>, TreeError> {
        Ok(Some(forest.blocks2.get(child)?.node))
    }

    fn adopt(forest: &mut Forest, id: Self, child: Block2Id) -> Result<(), TreeError> {
        forest.blocks2.get_mut(child)?.node = id;
        Ok(())
    }

    fn scope(id: Self) -> Scope {
        Scope::Node(id)
    }
}

// ============================================================================
//  Generic edits
// ============================================================================

impl Forest {
    /// Smallest key under a block, `EMPTY_MIN` when it has no children.
    pub(crate) fn container_min<C: Container>(&self, container: C) -> Result<Key, TreeError> {
        match C::span(self, container)?.first {
            Some(first) => C::Child::min_value(self, first),
            None => Ok(EMPTY_MIN),
        }
    }

    /// Largest key under a block, `EMPTY_MAX` when it has no children.
    pub(crate) fn container_max<C: Container>(&self, container: C) -> Result<Key, TreeError> {
        match C::span(self, container)?.last {
            Some(last) => C::Child::max_value(self, last),
            None => Ok(EMPTY_MAX),
        }
    }

    /// Child whose key range contains `value`.
    ///
    /// Falls back to the child just before the gap `value` falls into, to the
    /// last child when `value` exceeds every child, and to the first child
    /// when `value` is below every child. `None` only for an empty container.
    pub(crate) fn find_child_in<C: Container>(
        &self,
        container: C,
        value: Key,
    ) -> Result<Option<C::Child>, TreeError> {
        let span: Span<C::Child> = C::span(self, container)?;
        let (Some(first), Some(last)) = (span.first, span.last) else {
            return Ok(None);
        };

        if value > C::Child::max_value(self, last)? {
            return Ok(Some(last));
        }

        let mut previous: Option<C::Child> = None;
        let mut current: C::Child = first;
        loop {
            if C::Child::min_value(self, current)? > value {
                return Ok(Some(previous.unwrap_or(current)));
            }
            if value <= C::Child::max_value(self, current)? || current == last {
                return Ok(Some(current));
            }
            previous = Some(current);
            current = C::Child::links(self, current)?
                .right
                .ok_or(TreeError::CorruptLink("span ends before its last child"))?;
        }
    }

    /// Chain neighbours for a child that will sit between the in-container
    /// neighbours `left` and `right`.
    ///
    /// With both absent the container must be empty; the neighbours are then
    /// found by walking outward along the container's own chain until a
    /// non-empty sibling container turns up.
    pub(crate) fn chain_neighbours<C: Container + Linked>(
        &self,
        container: C,
        left: Option<C::Child>,
        right: Option<C::Child>,
    ) -> Result<(Option<C::Child>, Option<C::Child>), TreeError> {
        for given in [left, right].into_iter().flatten() {
            if C::father_of(self, given)? != Some(container) {
                return Err(TreeError::NotAdjacent);
            }
        }

        match (left, right) {
            (Some(l), _) => Ok((Some(l), C::Child::links(self, l)?.right)),
            (None, Some(r)) => Ok((C::Child::links(self, r)?.left, Some(r))),
            (None, None) => {
                if !C::span(self, container)?.is_empty() {
                    return Err(TreeError::CorruptLink("non-empty container needs a neighbour"));
                }

                let mut before: Option<C::Child> = None;
                let mut cursor: Option<C> = C::links(self, container)?.left;
                while let Some(sibling) = cursor {
                    before = C::span(self, sibling)?.last;
                    if before.is_some() {
                        break;
                    }
                    cursor = C::links(self, sibling)?.left;
                }

                let mut after: Option<C::Child> = None;
                let mut cursor: Option<C> = C::links(self, container)?.right;
                while let Some(sibling) = cursor {
                    after = C::span(self, sibling)?.first;
                    if after.is_some() {
                        break;
                    }
                    cursor = C::links(self, sibling)?.right;
                }

                Ok((before, after))
            }
        }
    }

    /// Splice `child` into the chain between `chain_left` and `chain_right`
    /// and into `container`'s span.
    pub(crate) fn attach<C: Container>(
        &mut self,
        container: C,
        child: C::Child,
        chain_left: Option<C::Child>,
        chain_right: Option<C::Child>,
    ) -> Result<(), TreeError> {
        if let Some(l) = chain_left {
            if C::Child::links(self, l)?.right != chain_right {
                return Err(TreeError::NotAdjacent);
            }
        }
        if let Some(r) = chain_right {
            if C::Child::links(self, r)?.left != chain_left {
                return Err(TreeError::NotAdjacent);
            }
        }

        let span: Span<C::Child> = C::span(self, container)?;
        if !span.is_empty() {
            let touches_left: bool = match chain_left {
                Some(l) => C::father_of(self, l)? == Some(container),
                None => false,
            };
            let touches_right: bool = match chain_right {
                Some(r) => C::father_of(self, r)? == Some(container),
                None => false,
            };
            if !touches_left && !touches_right {
                return Err(TreeError::NotAdjacent);
            }
        }

        *C::Child::links_mut(self, child)? = Links {
            left: chain_left,
            right: chain_right,
        };
        if let Some(l) = chain_left {
            C::Child::links_mut(self, l)?.right = Some(child);
        }
        if let Some(r) = chain_right {
            C::Child::links_mut(self, r)?.left = Some(child);
        }

        let span: &mut Span<C::Child> = C::span_mut(self, container)?;
        if span.is_empty() {
            span.first = Some(child);
            span.last = Some(child);
        } else {
            if chain_right.is_some() && span.first == chain_right {
                span.first = Some(child);
            }
            if chain_left.is_some() && span.last == chain_left {
                span.last = Some(child);
            }
        }
        span.len += 1;

        C::adopt(self, container, child)?;
        let weight: usize = C::weight(self, child)?;
        self.apply_degree_delta(C::scope(container), Delta::Grow(weight))
    }

    /// Unsplice `child` from the chain and from `container`'s span.
    pub(crate) fn detach<C: Container>(
        &mut self,
        container: C,
        child: C::Child,
    ) -> Result<(), TreeError> {
        if C::father_of(self, child)? != Some(container) {
            return Err(TreeError::CorruptLink("detach from a foreign container"));
        }

        let weight: usize = C::weight(self, child)?;
        let links: Links<C::Child> = C::Child::links(self, child)?;
        if let Some(l) = links.left {
            C::Child::links_mut(self, l)?.right = links.right;
        }
        if let Some(r) = links.right {
            C::Child::links_mut(self, r)?.left = links.left;
        }
        *C::Child::links_mut(self, child)? = Links::default();

        let span: &mut Span<C::Child> = C::span_mut(self, container)?;
        let was_first: bool = span.first == Some(child);
        let was_last: bool = span.last == Some(child);
        match (was_first, was_last) {
            (true, true) => {
                span.first = None;
                span.last = None;
            }
            (true, false) => span.first = links.right,
            (false, true) => span.last = links.left,
            (false, false) => {}
        }
        span.len = span.len.checked_sub(1).ok_or(TreeError::DegreeUnderflow)?;

        self.apply_degree_delta(C::scope(container), Delta::Shrink(weight))
    }

    /// Move the boundary child of `from` into the adjacent container `to`.
    ///
    /// With `to_front` the child must be `from`'s last child and becomes
    /// `to`'s first; otherwise it must be `from`'s first and becomes `to`'s
    /// last. The sibling chain is untouched.
    pub(crate) fn rehome<C: Container>(
        &mut self,
        from: C,
        to: C,
        child: C::Child,
        to_front: bool,
    ) -> Result<(), TreeError> {
        if C::father_of(self, child)? != Some(from) {
            return Err(TreeError::CorruptLink("rehome from a foreign container"));
        }

        let links: Links<C::Child> = C::Child::links(self, child)?;
        let from_span: Span<C::Child> = C::span(self, from)?;
        let to_span: Span<C::Child> = C::span(self, to)?;
        let boundary_ok: bool = if to_front {
            from_span.last == Some(child) && (to_span.first.is_none() || to_span.first == links.right)
        } else {
            from_span.first == Some(child) && (to_span.last.is_none() || to_span.last == links.left)
        };
        if !boundary_ok {
            return Err(TreeError::NotAdjacent);
        }

        let span: &mut Span<C::Child> = C::span_mut(self, from)?;
        if span.len == 1 {
            span.first = None;
            span.last = None;
        } else if to_front {
            span.last = links.left;
        } else {
            span.first = links.right;
        }
        span.len = span.len.checked_sub(1).ok_or(TreeError::DegreeUnderflow)?;

        let span: &mut Span<C::Child> = C::span_mut(self, to)?;
        if span.is_empty() {
            span.first = Some(child);
            span.last = Some(child);
        } else if to_front {
            span.first = Some(child);
        } else {
            span.last = Some(child);
        }
        span.len += 1;

        C::adopt(self, to, child)?;
        let weight: usize = C::weight(self, child)?;
        self.apply_degree_delta(C::scope(from), Delta::Shrink(weight))?;
        self.apply_degree_delta(C::scope(to), Delta::Grow(weight))
    }

    /// Last child of `container` when `towards_right`, first child otherwise.
    pub(crate) fn boundary_child<C: Container>(
        &self,
        container: C,
        towards_right: bool,
    ) -> Result<C::Child, TreeError> {
        let span: Span<C::Child> = C::span(self, container)?;
        let end: Option<C::Child> = if towards_right { span.last } else { span.first };
        end.ok_or(TreeError::EmptyContainer)
    }
}
