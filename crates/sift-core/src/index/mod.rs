//! # Filter Index
//!
//! Storage and evaluation for compiled filters:
//!
//! ```text
//!   field ──▶ conditions ──▶ subfilters ──▶ filters
//!   (lookup)  (predicates)   (test table)   (refcounted)
//! ```
//!
//! - [`FilterIndex`] — arena-backed store with content de-duplication and
//!   reference-count-driven cascading removal
//! - [`MatchScratch`] — reusable per-pass scoring buffer
//! - [`ConditionId`] / [`SubfilterId`] / [`FilterId`] — arena handles
//! - [`CollectionPath`] — the index/collection pair filters are scoped to

mod ids;
mod matching;
mod store;

pub use ids::{CollectionPath, ConditionId, FilterId, SubfilterId};
pub use matching::MatchScratch;
pub use store::{AddOutcome, FilterIndex, IndexError, ReleaseOutcome};
