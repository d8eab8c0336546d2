//! Error type shared by the structural primitives and the tree driver.

use std::fmt as StdFmt;

/// Errors reported by [`Forest`](crate::forest::Forest) primitives and
/// [`FingerTree`](crate::tree::FingerTree) operations.
///
/// Everything except [`TreeError::StaleHandle`] on a caller-held finger
/// indicates a violated precondition or a corrupted structure. None of them
/// are expected from the public tree API in normal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A handle refers to a slot that was freed (or never allocated).
    StaleHandle {
        /// Which arena the handle points into.
        kind: &'static str,
        /// Slot index carried by the handle.
        index: u32,
    },

    /// An arena ran out of 32-bit slot indices.
    ArenaFull {
        /// Which arena overflowed.
        kind: &'static str,
    },

    /// A mate transfer was requested on a block without a mate.
    MissingMate,

    /// Two entities that must be siblings in the level chain are not.
    NotAdjacent,

    /// An operation needed a child from a container that has none.
    EmptyContainer,

    /// A leaf-only operation received an internal node (or the reverse).
    NotALeaf,

    /// `fuse` was called on groups that do not satisfy the fuse preconditions.
    CannotFuse,

    /// `share` was called on groups that do not satisfy the share preconditions.
    CannotShare,

    /// `split` was called on a node with fewer than two Block2 units.
    CannotSplit,

    /// A degree counter would drop below zero.
    DegreeUnderflow,

    /// A sibling, father or span pointer is missing where the structure
    /// guarantees one.
    CorruptLink(&'static str),

    /// The invariant checker found a violation.
    InvariantViolated(String),
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::StaleHandle { kind, index } => {
                write!(f, "stale {kind} handle (slot {index})")
            }

            Self::ArenaFull { kind } => write!(f, "{kind} arena is full"),

            Self::MissingMate => write!(f, "block has no mate"),

            Self::NotAdjacent => write!(f, "entities are not adjacent siblings"),

            Self::EmptyContainer => write!(f, "container has no children"),

            Self::NotALeaf => write!(f, "node kind does not match the operation"),

            Self::CannotFuse => write!(f, "groups cannot be fused"),

            Self::CannotShare => write!(f, "groups cannot share"),

            Self::CannotSplit => write!(f, "node has too few block2 units to split"),

            Self::DegreeUnderflow => write!(f, "degree counter underflow"),

            Self::CorruptLink(what) => write!(f, "corrupt link: {what}"),

            Self::InvariantViolated(detail) => write!(f, "invariant violated: {detail}"),
        }
    }
}

impl std::error::Error for TreeError {}
