//! Per-level degree thresholds.
//!
//! Three doubly-exponential families, indexed by the level `L` of the node
//! that owns the block being measured:
//!
//! | family | value | level 0 | level 1 | level 2 |
//! |--------|-------|---------|---------|---------|
//! | [`a`]  | `2^(2^(2L))` | 2 | 16 | 65 536 |
//! | [`f`]  | `2^(2^(2L+1))` | 4 | 256 | 2^32 |
//! | [`b_plus`] | `2^(2^(2L+3) - 2)` | 64 | 2^30 | saturated |
//!
//! Values that do not fit in a `usize` saturate at `usize::MAX`, which keeps
//! every family monotone and total. The table is computed once per process.

use std::sync::OnceLock;

/// Levels with a precomputed row. Every family is saturated well before this.
const TABLE_LEVELS: usize = 8;

/// Thresholds for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelBounds {
    /// Block1 capacity, `A(L)`.
    pub a: usize,
    /// Block2 capacity in fusion mode, `F(L)`.
    pub f: usize,
    /// Block2 capacity in split mode, `B⁺(L)`.
    pub b_plus: usize,
}

const SATURATED: LevelBounds = LevelBounds {
    a: usize::MAX,
    f: usize::MAX,
    b_plus: usize::MAX,
};

static TABLE: OnceLock<[LevelBounds; TABLE_LEVELS]> = OnceLock::new();

/// `2^(2^log_exp - minus)`, saturating.
fn tower(log_exp: u32, minus: u64) -> usize {
    if log_exp >= u64::BITS {
        return usize::MAX;
    }
    let exp: u64 = (1u64 << log_exp).saturating_sub(minus);
    if exp >= u64::from(usize::BITS) {
        return usize::MAX;
    }
    1usize << exp
}

fn table() -> &'static [LevelBounds; TABLE_LEVELS] {
    TABLE.get_or_init(|| {
        let mut rows: [LevelBounds; TABLE_LEVELS] = [SATURATED; TABLE_LEVELS];
        for (level, row) in (0u32..).zip(rows.iter_mut()) {
            *row = LevelBounds {
                a: tower(2 * level, 0),
                f: tower(2 * level + 1, 0),
                b_plus: tower(2 * level + 3, 2),
            };
        }
        rows
    })
}

/// All three thresholds for `level`.
#[inline]
#[must_use]
pub fn level_bounds(level: u32) -> LevelBounds {
    usize::try_from(level)
        .ok()
        .and_then(|idx| table().get(idx).copied())
        .unwrap_or(SATURATED)
}

/// Block1 capacity `A(level)`.
#[inline]
#[must_use]
pub fn a(level: u32) -> usize {
    level_bounds(level).a
}

/// Block2 capacity in fusion mode, `F(level)`.
#[inline]
#[must_use]
pub fn f(level: u32) -> usize {
    level_bounds(level).f
}

/// Block2 capacity in split mode, `B⁺(level)`.
#[inline]
#[must_use]
pub fn b_plus(level: u32) -> usize {
    level_bounds(level).b_plus
}

/// Group split-mode threshold, `4·F(level)`.
#[inline]
#[must_use]
pub fn group_limit(level: u32) -> usize {
    f(level).saturating_mul(4)
}
