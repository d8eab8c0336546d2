//! # fingersearch
//!
//! A finger search tree over `i64` keys.
//!
//! Given a [`Finger`] (a handle to a leaf obtained from an earlier search),
//! finding a key `d` positions away costs `O(log log d)` levels of climbing
//! plus bounded scans, and an insert or delete at a finger is O(1) amortized.
//!
//! ## Structure
//!
//! Per-level child-count bounds grow doubly exponentially with height (see
//! [`bounds`]). Between a node and its children sit two buffering layers:
//!
//! | layer | holds | full at |
//! |-------|-------|---------|
//! | [`Block1`](block1::Block1) | sibling nodes | `A(L)` |
//! | [`Block2`](block2::Block2) | Block1 units | `F(L)` or `B⁺(L)` |
//! | internal [`Node`](node::Node) | Block2 units | split past [`MAX_BLOCK2_PER_NODE`](node::MAX_BLOCK2_PER_NODE) |
//!
//! Overflow is absorbed one element at a time by a paired neighbour (the
//! *mate*). Adjacent nodes are pooled into [`groups`](group) that share a
//! degree budget; a group that outgrows it is retired lazily in O(1).
//!
//! ## Layout
//!
//! - [`forest::Forest`] owns every entity in generational arenas
//!   ([`alloc`]) and exposes the structural primitives as methods.
//! - [`tree::FingerTree`] is the driver deciding when the primitives run.
//! - [`shared::SharedFingerTree`] adds a read-write lock for sharing across
//!   threads.
//!
//! ```rust
//! use fingersearch::FingerTree;
//!
//! let mut tree = FingerTree::new();
//! for key in 0..1_000 {
//!     tree.insert(key * 10).unwrap();
//! }
//!
//! let finger = tree.search(5_000).unwrap().unwrap();
//! let (found, trace) = tree.finger_search_traced(finger, 5_020).unwrap();
//! assert_eq!(tree.value(found).unwrap(), 5_020);
//! assert!(trace.hops() <= 4);
//!
//! assert!(tree.remove(5_020).unwrap());
//! tree.check_invariants().unwrap();
//! ```
//!
//! ## Features
//!
//! - `tracing`: structural events (splits, fuses, group breaks) and
//!   per-transfer events through the `tracing` crate. Off by default.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod alloc;
pub mod block1;
pub mod block2;
pub mod bounds;
pub mod error;
pub mod forest;
pub mod group;
pub mod layer;
pub mod node;
pub mod shared;
pub mod tree;
pub mod validate;

mod tracing_helpers;

/// Key type stored in the tree.
pub type Key = i64;

/// Minimum reported by an empty container.
pub const EMPTY_MIN: Key = i64::MAX;

/// Maximum reported by an empty container.
pub const EMPTY_MAX: Key = i64::MIN;

pub use alloc::{Block1Id, Block2Id, ComponentId, GroupId, Handle, NodeId};
pub use error::TreeError;
pub use forest::{Forest, NodeObserver, NoopObserver};
pub use shared::SharedFingerTree;
pub use tree::{Finger, FingerTree, Iter, SearchTrace};
pub use validate::Census;
