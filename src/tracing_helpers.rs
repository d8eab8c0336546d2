//! Zero-cost tracing helpers.
//!
//! When the `tracing` feature is enabled, these macros forward to the `tracing` crate.
//! When disabled (default), they compile to no-ops with zero runtime overhead.
//!
//! # Usage
//!
//! ```bash
//! # Normal build - no tracing overhead
//! cargo build --release
//!
//! # Structural events (splits, fuses, multi-breaks) while testing
//! RUST_LOG=fingersearch=debug cargo test --features tracing
//!
//! # Every mate transfer as well
//! RUST_LOG=fingersearch::block2=trace cargo test --features tracing stress_ascending
//! ```
//!
//! # Function Instrumentation
//!
//! Structural operations carry
//! `#[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, observer)))]`
//! so their span shows up around the events they emit:
//!
//! ```ignore
//! #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
//! pub fn node_split(&mut self, node: NodeId) -> Result<SplitOutcome, TreeError> {
//!     // ...
//! }
//! ```

#![allow(unused_macros, unused_imports)]

/// Trace-level logging (most verbose). Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Debug-level logging. Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// Warn-level logging. Compiles to no-op without `tracing` feature.
#[cfg(feature = "tracing")]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! warn_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
pub(crate) use warn_log;
