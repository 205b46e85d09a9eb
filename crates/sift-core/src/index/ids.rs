//! Integer handles and collection addressing for the filter index.
//!
//! Conditions, subfilters and filters live in arena slots; these newtypes
//! are the only way the rest of the engine refers to them. Slots are reused
//! after removal, so an id is only meaningful while its owner is alive.

use std::fmt;

use serde::Serialize;

/// Handle of a stored condition (a leaf predicate instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConditionId(pub u32);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cond-{}", self.0)
    }
}

/// Handle of a stored subfilter (one conjunctive clause).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubfilterId(pub u32);

impl fmt::Display for SubfilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sf-{}", self.0)
    }
}

/// Handle of a registered filter (a full disjunction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FilterId(pub u32);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flt-{}", self.0)
    }
}

/// The index/collection pair a filter is scoped to.
///
/// Filters never match across collections: every index structure is keyed by
/// this path first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CollectionPath {
    /// Name of the index (the outer namespace).
    pub index: String,
    /// Name of the collection inside the index.
    pub collection: String,
}

impl CollectionPath {
    /// Builds a path from an index and collection name.
    pub fn new(index: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { index: index.into(), collection: collection.into() }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.collection)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
