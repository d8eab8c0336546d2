//! Stress tests for `FingerTree` restructuring.
//!
//! These tests push enough keys through the tree to trigger every
//! rebalancing path:
//! - Block1 and Block2 overflow into mates
//! - node splits and root growth
//! - group pooling and lazy group breaks
//! - fuse, share and root collapse on the way down
//!
//! Run all stress tests:
//! ```bash
//! cargo test --test stress_tests --release
//! ```
//!
//! With structural events:
//! ```bash
//! RUST_LOG=fingersearch=debug cargo test --features tracing --test stress_tests --release
//! ```

#![allow(clippy::pedantic)]
#![expect(clippy::unwrap_used)]
#![allow(clippy::panic)]

mod common;

use common::{Lcg, tree_of};
use fingersearch::{Finger, FingerTree, SharedFingerTree};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

// =============================================================================
// Test Configuration
// =============================================================================

const KEYS: i64 = 3_000;

/// Check invariants every this many operations.
const CHECK_EVERY: usize = 97;

/// Verify all keys are findable, panic with details if any missing
fn verify_all_keys(tree: &FingerTree, expected: &BTreeSet<i64>, test_name: &str) {
    let missing: Vec<i64> = expected
        .iter()
        .copied()
        .filter(|&key| !tree.contains(key).unwrap())
        .collect();

    if !missing.is_empty() {
        let sample: Vec<_> = missing.iter().take(20).collect();
        panic!(
            "{}: Missing {} keys (showing first 20): {:?}\n\
             tree.len()={}, expected={}",
            test_name,
            missing.len(),
            sample,
            tree.len(),
            expected.len()
        );
    }
    assert!(tree.iter().eq(expected.iter().copied()), "{test_name}: order mismatch");
}

/// Remove `order` one key at a time, checking the structure periodically.
fn drain(tree: &mut FingerTree, order: &[i64], test_name: &str) {
    let mut expected: BTreeSet<i64> = tree.iter().collect();
    for (step, &key) in order.iter().enumerate() {
        assert!(tree.remove(key).unwrap(), "{test_name}: remove {key} failed");
        expected.remove(&key);
        if step % CHECK_EVERY == 0 {
            tree.check_invariants()
                .unwrap_or_else(|err| panic!("{test_name}: step {step}: {err}"));
            verify_all_keys(tree, &expected, test_name);
        }
    }
    assert!(tree.is_empty(), "{test_name}: {} keys left", tree.len());
    assert_eq!(tree.forest().node_count(), 0, "{test_name}: leaked nodes");
    assert_eq!(tree.forest().group_count(), 0, "{test_name}: leaked groups");
}

fn shuffled(keys: impl IntoIterator<Item = i64>, seed: u64) -> Vec<i64> {
    let mut keys: Vec<i64> = keys.into_iter().collect();
    let mut rng = Lcg::new(seed);
    for i in (1..keys.len()).rev() {
        let j = rng.next_below(i as u64 + 1) as usize;
        keys.swap(i, j);
    }
    keys
}

// =============================================================================
// INSERT ORDER TESTS
// =============================================================================

#[test]
fn ascending_insert_then_ascending_remove() {
    common::init_tracing();
    let mut tree = tree_of(0..KEYS);
    let census = tree.check_invariants().unwrap();
    assert_eq!(census.leaves, KEYS as usize);
    assert!(census.height >= 2, "3000 keys must outgrow one level");
    verify_all_keys(&tree, &(0..KEYS).collect(), "ascending");

    let order: Vec<i64> = (0..KEYS).collect();
    drain(&mut tree, &order, "ascending");
}

#[test]
fn descending_insert_then_descending_remove() {
    common::init_tracing();
    let mut tree = tree_of((0..KEYS).rev());
    tree.check_invariants().unwrap();
    verify_all_keys(&tree, &(0..KEYS).collect(), "descending");

    let order: Vec<i64> = (0..KEYS).rev().collect();
    drain(&mut tree, &order, "descending");
}

#[test]
fn random_insert_then_random_remove() {
    common::init_tracing();
    let inserts = shuffled(0..KEYS, 0xdead_beef);
    let mut tree = tree_of(inserts.iter().copied());
    tree.check_invariants().unwrap();
    verify_all_keys(&tree, &(0..KEYS).collect(), "random");

    let removes = shuffled(0..KEYS, 0x0bad_cafe);
    drain(&mut tree, &removes, "random");
}

#[test]
fn interleaved_outside_in_remove() {
    common::init_tracing();
    let mut tree = tree_of(0..KEYS);
    let order: Vec<i64> = (0..KEYS / 2)
        .flat_map(|i| [i, KEYS - 1 - i])
        .collect();
    drain(&mut tree, &order, "outside_in");
}

// =============================================================================
// MIXED WORKLOAD TESTS
// =============================================================================

#[test]
fn mixed_churn_against_oracle() {
    common::init_tracing();
    let mut tree = FingerTree::new();
    let mut oracle: BTreeSet<i64> = BTreeSet::new();
    let mut rng = Lcg::new(42);

    for step in 0..20_000usize {
        let key = rng.next_below(4_000) as i64;
        // Bias toward inserts early and removes late so the tree grows then shrinks.
        let insert_bias = if step < 12_000 { 7 } else { 3 };
        if rng.next_below(10) < insert_bias {
            assert_eq!(tree.insert(key).unwrap(), oracle.insert(key), "insert {key}");
        } else {
            assert_eq!(tree.remove(key).unwrap(), oracle.remove(&key), "remove {key}");
        }
        if step % 499 == 0 {
            tree.check_invariants()
                .unwrap_or_else(|err| panic!("step {step}: {err}"));
        }
    }

    verify_all_keys(&tree, &oracle, "mixed_churn");
    tree.check_invariants().unwrap();
}

#[test]
fn sliding_window_with_fingers() {
    common::init_tracing();
    // Keep a window of 1000 keys and slide it right, inserting and removing
    // through fingers at both ends.
    let mut tree = tree_of(0..1_000);
    let mut low: i64 = 0;
    let mut high: i64 = 1_000;

    for step in 0..5_000usize {
        let tail: Finger = tree.search(high - 1).unwrap().unwrap();
        assert!(tree.insert_near(tail, high).unwrap());
        high += 1;

        let head: Finger = tree.search(low).unwrap().unwrap();
        let (found, trace) = tree.finger_search_traced(head, low + 1).unwrap();
        assert_eq!(tree.value(found).unwrap(), low + 1);
        assert!(trace.hops() <= 2 * tree.height() + 1, "step {step}: {trace:?}");

        assert!(tree.remove(low).unwrap());
        low += 1;

        if step % 250 == 0 {
            tree.check_invariants()
                .unwrap_or_else(|err| panic!("step {step}: {err}"));
        }
    }

    assert_eq!(tree.len(), 1_000);
    assert!(tree.iter().eq(low..high));
    tree.check_invariants().unwrap();
}

// =============================================================================
// SHARED TREE TESTS
// =============================================================================

#[test]
fn shared_tree_writers_and_readers() {
    common::init_tracing();

    const NUM_WRITERS: i64 = 4;
    const KEYS_PER_WRITER: i64 = 750;

    let shared = Arc::new(SharedFingerTree::new());

    let writers: Vec<_> = (0..NUM_WRITERS)
        .map(|t| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for i in 0..KEYS_PER_WRITER {
                    assert!(shared.insert(i * NUM_WRITERS + t).unwrap());
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for target in 0..2_000 {
                    let tree = shared.read();
                    if let Some(finger) = tree.search(target).unwrap() {
                        let key = tree.value(finger).unwrap();
                        assert!(key <= target || Some(key) == tree.first().unwrap());
                    }
                }
            })
        })
        .collect();

    for h in writers.into_iter().chain(readers) {
        h.join().unwrap();
    }

    let tree = Arc::try_unwrap(shared).unwrap().into_inner();
    assert_eq!(tree.len(), (NUM_WRITERS * KEYS_PER_WRITER) as usize);
    assert!(tree.iter().eq(0..NUM_WRITERS * KEYS_PER_WRITER));
    tree.check_invariants().unwrap();
}
