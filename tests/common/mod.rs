//! Shared setup for the integration tests: tracing and small tree helpers.
//!
//! Set `RUST_LOG` (for example `fingersearch=debug`) to see structural
//! events in the captured test output.

#![allow(dead_code)]

use std::sync::Once;

use fingersearch::FingerTree;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test-writer subscriber filtered by `RUST_LOG`. Only the first
/// call has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter: EnvFilter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .compact()
            .try_init();
    });
}

// ============================================================================
//  Tree helpers
// ============================================================================

/// Small deterministic generator so workloads replay identically.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    /// Seeded generator.
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Next value in `0..bound`.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

/// Build a tree holding `keys`, inserted in the given order.
#[expect(clippy::unwrap_used, reason = "Fail fast in tests")]
pub fn tree_of(keys: impl IntoIterator<Item = i64>) -> FingerTree {
    let mut tree = FingerTree::new();
    for key in keys {
        tree.insert(key).unwrap();
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        tracing::info!("tracing initialized");
        tracing::debug!(key = 42, "debug event");
    }

    #[test]
    fn test_lcg_is_deterministic() {
        let mut a = Lcg::new(7);
        let mut b = Lcg::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_below(1_000), b.next_below(1_000));
        }
    }
}
