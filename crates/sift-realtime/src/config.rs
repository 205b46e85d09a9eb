//! Engine limits.

use sift_core::CompileLimits;

/// Tunable limits for a [`RealtimeEngine`](crate::RealtimeEngine).
///
/// Each limit can be set to `0` to disable it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of distinct conditions in one subscription filter.
    pub max_conditions_per_filter: usize,
    /// Maximum number of conjunctive clauses a filter may expand to.
    pub max_minterms: usize,
    /// Maximum number of concurrent rooms across all collections.
    pub max_rooms: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conditions_per_filter: 128,
            max_minterms: 256,
            max_rooms: 1_000_000,
        }
    }
}

impl EngineConfig {
    /// A configuration with every limit disabled.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { max_conditions_per_filter: 0, max_minterms: 0, max_rooms: 0 }
    }

    pub(crate) fn compile_limits(&self) -> CompileLimits {
        CompileLimits {
            max_conditions: self.max_conditions_per_filter,
            max_minterms: self.max_minterms,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
