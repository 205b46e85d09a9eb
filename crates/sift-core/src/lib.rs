//! # Sift Core
//!
//! The content-based matching core for sift: compiles boolean filter
//! expressions over document fields into a normalized, de-duplicated form and
//! indexes them so that a single document write is evaluated against every
//! registered filter in time proportional to the conditions it can actually
//! touch, not to the total number of filters.
//!
//! This crate provides:
//! - **DSL**: filter parsing, negation push-down and disjunctive
//!   normalization, canonical content keys for structural de-duplication
//! - **Operators**: the closed set of leaf predicates (equality, membership,
//!   ranges, existence, regular expressions, geospatial shapes)
//! - **Filter Index**: arena-backed condition/subfilter/filter store with
//!   reference counting and field-driven lookup tables
//! - **Matching**: short-circuit evaluation of flattened documents against
//!   the index, yielding the set of satisfied filter ids
//!
//! ## Design Principles
//!
//! 1. **Single-threaded by construction** - mutation takes `&mut self`,
//!    evaluation takes `&self` plus a caller-owned scratch buffer
//! 2. **Everything reference counted** - removing the last subscriber of a
//!    filter eagerly tears down every structure it exclusively owned
//! 3. **Structural de-duplication** - equivalent filters (reordered operands
//!    included) share one compiled representation
//!
//! ## Example
//!
//! ```rust,ignore
//! use sift_core::{compile, CollectionPath, FilterIndex, FlatDocument};
//!
//! let filter = compile(&serde_json::json!({ "equals": { "status": "open" } }))?;
//! let mut index = FilterIndex::new();
//! let path = CollectionPath::new("crm", "tickets");
//! let added = index.add_filter(&path, &filter);
//!
//! let doc = FlatDocument::from_value(&serde_json::json!({ "status": "open" }));
//! assert_eq!(index.evaluate(&path, &doc), vec![added.filter]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod dsl;
pub mod index;

// Re-export key types
pub use document::FlatDocument;
pub use dsl::{compile, compile_with_limits, CompileLimits, FilterError, NormalizedFilter};
pub use index::{
    AddOutcome, CollectionPath, ConditionId, FilterId, FilterIndex, IndexError, MatchScratch,
    ReleaseOutcome, SubfilterId,
};

/// Result type for sift-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sift-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filter compilation errors
    #[error("Filter error: {0}")]
    Filter(#[from] dsl::FilterError),

    /// Filter index errors
    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),
}
