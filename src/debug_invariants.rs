//! Structural checks on snapshots the engine builds itself.
//!
//! Input graphs are checked with [`DebugInvariants::validate_invariants`]
//! when a run starts and rejected as configuration errors. Snapshots derived
//! from a checked input only go through [`debug_invariants!`], which costs
//! nothing in release builds unless `strict-invariants` is enabled.

use crate::graph_error::GraphError;

pub trait DebugInvariants {
    /// Panics on the first broken invariant in checked builds; no-op otherwise.
    fn debug_assert_invariants(&self);
    fn validate_invariants(&self) -> Result<(), GraphError>;
}

/// `debug_invariants!(check, "what")` panics with the check's error when
/// invariant checking is compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(broken) = $check {
            panic!("{} broke an invariant: {}", $what, broken);
        }
    };
}
