//! End-to-end scenarios and finger-distance scaling.

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use common::{Lcg, tree_of};
use fingersearch::bounds;
use fingersearch::{
    Block1Id, Block2Id, Finger, FingerTree, Forest, GroupId, NodeId, NodeObserver, SearchTrace,
};
use std::collections::BTreeSet;

// ============================================================================
//  Scenarios
// ============================================================================

#[test]
fn scenario_ascending_sixteen() {
    common::init_tracing();
    let tree: FingerTree = tree_of(1..=16);

    assert_eq!(tree.len(), 16);
    assert_eq!(tree.iter().collect::<Vec<_>>(), (1..=16).collect::<Vec<_>>());
    assert_eq!(tree.height(), 1);
    let census = tree.check_invariants().unwrap();
    assert_eq!(census.leaves, 16);
    // Sixteen keys fill exactly one Block1.
    assert_eq!(census.block1, 1);
}

#[test]
fn scenario_predecessor_lookup() {
    common::init_tracing();
    let tree: FingerTree = tree_of([10, 20, 30]);

    let finger: Finger = tree.search(25).unwrap().unwrap();
    assert_eq!(tree.value(finger).unwrap(), 20);
    assert!(!tree.contains(25).unwrap());
    assert!(tree.contains(30).unwrap());
}

#[test]
fn scenario_random_churn_ends_empty() {
    common::init_tracing();
    let mut tree: FingerTree = FingerTree::new();
    let mut oracle: BTreeSet<i64> = BTreeSet::new();
    let mut rng: Lcg = Lcg::new(0x5eed);

    let mut keys: Vec<i64> = Vec::new();
    while keys.len() < 50 {
        let key = rng.next_below(1_000) as i64;
        if oracle.insert(key) {
            keys.push(key);
        }
    }
    for &key in &keys {
        assert!(tree.insert(key).unwrap());
        tree.check_invariants().unwrap();
    }

    // Delete in a different order: a Fisher-Yates shuffle of the insert order.
    let mut order: Vec<i64> = keys.clone();
    for i in (1..order.len()).rev() {
        let j = rng.next_below(i as u64 + 1) as usize;
        order.swap(i, j);
    }
    for &key in &order {
        assert!(tree.remove(key).unwrap(), "remove {key}");
        oracle.remove(&key);
        tree.check_invariants().unwrap();
        assert!(tree.iter().eq(oracle.iter().copied()));
    }

    assert!(tree.is_empty());
    assert_eq!(tree.root(), None);
    assert_eq!(tree.forest().node_count(), 0);
}

#[derive(Default)]
struct Emptied(Vec<NodeId>);

impl NodeObserver for Emptied {
    fn on_node_emptied(&mut self, forest: &Forest, node: NodeId) {
        assert!(forest.node(node).unwrap().father().is_none());
        self.0.push(node);
    }
}

/// Level-1 node under `parent_block`, holding one Block2 per entry of
/// `layout` and one Block1 per inner entry with that many leaves.
fn level_one(
    forest: &mut Forest,
    parent_block: Block1Id,
    after: Option<NodeId>,
    layout: &[&[i64]],
    next_key: &mut i64,
) -> NodeId {
    let node: NodeId = forest.create_internal(1).unwrap();
    forest.block1_add(parent_block, after, node, None).unwrap();
    let mut previous_b2: Option<Block2Id> = None;
    for sizes in layout {
        let b2: Block2Id = forest.create_block2(node).unwrap();
        forest.node_add(node, previous_b2, b2, None).unwrap();
        let mut previous_b1: Option<Block1Id> = None;
        for &size in *sizes {
            let b1: Block1Id = forest.create_block1(b2).unwrap();
            forest.block2_add(b2, previous_b1, b1, None).unwrap();
            let mut previous_leaf: Option<NodeId> = None;
            for _ in 0..size {
                let leaf: NodeId = forest.create_leaf(*next_key).unwrap();
                *next_key += 1;
                forest.block1_add(b1, previous_leaf, leaf, None).unwrap();
                previous_leaf = Some(leaf);
            }
            previous_b1 = Some(b1);
        }
        previous_b2 = Some(b2);
    }
    node
}

#[test]
fn scenario_fuse_then_lazy_group_read() {
    common::init_tracing();
    let mut forest: Forest = Forest::new();
    let root: NodeId = forest.create_internal(2).unwrap();
    let top2: Block2Id = forest.create_block2(root).unwrap();
    forest.node_add(root, None, top2, None).unwrap();
    let top1: Block1Id = forest.create_block1(top2).unwrap();
    forest.block2_add(top2, None, top1, None).unwrap();

    let mut key: i64 = 0;
    // Two minimal nodes (one Block1, one child each) next to a larger one.
    let a: NodeId = level_one(&mut forest, top1, None, &[&[1]], &mut key);
    let b: NodeId = level_one(&mut forest, top1, Some(a), &[&[1]], &mut key);
    let c: NodeId = level_one(&mut forest, top1, Some(b), &[&[5], &[5]], &mut key);
    forest.validate(Some(root)).unwrap();

    // Fold `b` into `a`.
    let donor: GroupId = forest.resolve_group(b).unwrap();
    let receiver: GroupId = forest.resolve_group(a).unwrap();
    assert!(forest.group_can_be_fused(donor, receiver).unwrap());
    let mut emptied: Emptied = Emptied::default();
    let receiving: Block2Id = forest.group_fuse(donor, receiver, &mut emptied).unwrap();

    assert_eq!(emptied.0, vec![b]);
    assert!(!forest.contains_node(b));
    assert_eq!(forest.block2(receiving).unwrap().node(), a);
    assert_eq!(forest.node(a).unwrap().degree(), 2);
    let migrated: Block1Id = forest.block2(receiving).unwrap().last().unwrap();
    let leaf: NodeId = forest.block1(migrated).unwrap().first().unwrap();
    assert_eq!(forest.node(leaf).unwrap().value(), Some(1));
    assert_eq!(forest.node_parent(leaf).unwrap(), Some(a));
    assert_eq!(forest.node(a).unwrap().right(), Some(c));
    let census = forest.validate(Some(root)).unwrap();
    assert_eq!(census.leaves, 12);

    // Pool `a` and `c`, then break the pool: nothing moves until read.
    forest.group_add(a, c).unwrap();
    let pooled: GroupId = forest.resolve_group(a).unwrap();
    assert_eq!(forest.group(pooled).unwrap().degree(), 12);
    forest.group_multi_break(pooled).unwrap();
    assert_eq!(forest.node(c).unwrap().group(), Some(pooled));

    let root_group: GroupId = forest.resolve_group(root).unwrap();
    let root_component = forest.group(root_group).unwrap().component();
    let ga: GroupId = forest.resolve_group(a).unwrap();
    let gc: GroupId = forest.resolve_group(c).unwrap();
    assert_ne!(ga, gc);
    assert!(forest.group(ga).unwrap().is_valid());
    assert_eq!(forest.group(ga).unwrap().degree(), 2);
    assert_eq!(forest.group(gc).unwrap().degree(), 10);
    assert_eq!(forest.group(gc).unwrap().component(), root_component);
    assert!(forest.group(pooled).is_err());
    forest.validate(Some(root)).unwrap();
}

// ============================================================================
//  Finger-distance scaling
// ============================================================================

#[test]
fn finger_distance_two_stays_local() {
    common::init_tracing();
    for n in [64i64, 512, 4_096] {
        let tree: FingerTree = tree_of(0..n);
        for start in (0..n - 2).step_by(7) {
            let finger: Finger = tree.search(start).unwrap().unwrap();
            let (found, trace): (Finger, SearchTrace) =
                tree.finger_search_traced(finger, start + 2).unwrap();
            assert_eq!(tree.value(found).unwrap(), start + 2);
            assert!(trace.climbed <= 1, "n={n} start={start}: {trace:?}");
            assert!(trace.hops() <= 3, "n={n} start={start}: {trace:?}");
        }
    }
}

#[test]
fn finger_cost_bounded_by_height() {
    common::init_tracing();
    let n: i64 = 4_096;
    let tree: FingerTree = tree_of(0..n);
    let height: u32 = tree.height();
    let finger: Finger = tree.search(n / 2).unwrap().unwrap();

    for distance in [1i64, 2, 16, 256, 1_000, 2_000] {
        for target in [n / 2 + distance, n / 2 - distance] {
            let (found, trace) = tree.finger_search_traced(finger, target).unwrap();
            assert_eq!(tree.value(found).unwrap(), target);
            assert!(trace.climbed <= height, "distance {distance}: {trace:?}");
            assert!(trace.hops() <= 2 * height + 1, "distance {distance}: {trace:?}");
        }
    }
}

#[test]
fn block_capacities_follow_bounds() {
    let tree: FingerTree = tree_of(0..2_000);
    let forest: &Forest = tree.forest();
    let mut cursor: Option<NodeId> = tree.search(0).unwrap().map(Finger::node);
    let mut seen: usize = 0;
    while let Some(leaf) = cursor {
        let block: Block1Id = forest.node(leaf).unwrap().father().unwrap();
        assert!(forest.block1(block).unwrap().degree() <= bounds::a(1));
        let b2: Block2Id = forest.block1(block).unwrap().father();
        assert!(forest.block2(b2).unwrap().degree() <= bounds::f(1));
        cursor = forest.node(leaf).unwrap().right();
        seen += 1;
    }
    assert_eq!(seen, 2_000);
}
