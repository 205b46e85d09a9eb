//! Document evaluation against the filter index.
//!
//! A pass walks only the document's fields: for every field with registered
//! conditions, each condition's predicate runs once and its outcome is
//! propagated to the subfilters using it. A subfilter's score starts at its
//! negated-literal count (negations hold until disproven), gains one per
//! satisfied positive literal and loses one per violated negation; the
//! clause is satisfied when the final score equals its literal count.
//! Subfilters made only of negations match implicitly when the document
//! touches none of their conditions, and match-everything filters are
//! unioned in at the end.
//!
//! Cost is proportional to the conditions the document can actually touch,
//! never to the total number of registered filters.

use fxhash::{FxHashMap, FxHashSet};

use crate::document::FlatDocument;

use super::ids::{CollectionPath, FilterId, SubfilterId};
use super::store::FilterIndex;

// ---------------------------------------------------------------------------
// Scratch
// ---------------------------------------------------------------------------

/// Reusable per-pass state for [`FilterIndex::evaluate_into`].
///
/// Holding one of these across calls only recycles allocations; every pass
/// starts from a cleared buffer, so results never leak between documents.
#[derive(Debug, Default)]
pub struct MatchScratch {
    scores: FxHashMap<SubfilterId, i64>,
    matched: FxHashSet<FilterId>,
}

impl MatchScratch {
    /// Creates an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.scores.clear();
        self.matched.clear();
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl FilterIndex {
    /// Evaluates a flattened document, allocating a fresh scratch buffer.
    ///
    /// Returns the ids of every satisfied filter, de-duplicated and sorted.
    #[must_use]
    pub fn evaluate(&self, path: &CollectionPath, document: &FlatDocument<'_>) -> Vec<FilterId> {
        let mut scratch = MatchScratch::new();
        self.evaluate_into(path, document, &mut scratch)
    }

    /// Evaluates a flattened document using a caller-owned scratch buffer.
    ///
    /// Returns the ids of every satisfied filter, de-duplicated and sorted.
    #[must_use]
    pub fn evaluate_into(
        &self,
        path: &CollectionPath,
        document: &FlatDocument<'_>,
        scratch: &mut MatchScratch,
    ) -> Vec<FilterId> {
        scratch.reset();
        let Some(coll) = self.collections.get(path) else {
            return Vec::new();
        };

        // score every subfilter the document's fields can reach
        for (field, value) in document.iter() {
            let Some(condition_ids) = coll.fields.get(field) else {
                continue;
            };
            for &cid in condition_ids {
                let Some(condition) = self.conditions.get(cid.0) else {
                    continue;
                };
                if !condition.predicate.matches(value) {
                    continue;
                }
                let delta: i64 = if condition.negated { -1 } else { 1 };
                for &sid in &condition.subfilters {
                    let Some(subfilter) = self.subfilters.get(sid.0) else {
                        continue;
                    };
                    let score = scratch
                        .scores
                        .entry(sid)
                        .or_insert_with(|| i64::from(subfilter.negated));
                    *score += delta;
                }
            }
        }

        // collect satisfied subfilters
        for (&sid, &score) in &scratch.scores {
            let Some(subfilter) = self.subfilters.get(sid.0) else {
                continue;
            };
            if score == i64::from(subfilter.required) {
                scratch.matched.extend(subfilter.filters.iter().copied());
            }
        }

        // purely negative subfilters match when the document never touched them
        for &sid in &coll.pure_negative {
            if scratch.scores.contains_key(&sid) {
                continue;
            }
            let Some(subfilter) = self.subfilters.get(sid.0) else {
                continue;
            };
            scratch.matched.extend(subfilter.filters.iter().copied());
        }

        scratch.matched.extend(coll.global_filters.iter().copied());

        let mut matched: Vec<FilterId> = scratch.matched.iter().copied().collect();
        matched.sort_unstable();
        matched
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::compile;
    use serde_json::{json, Value};

    fn path() -> CollectionPath {
        CollectionPath::new("crm", "tickets")
    }

    fn add(index: &mut FilterIndex, body: Value) -> FilterId {
        let filter = compile(&body).expect("filter should compile");
        index.add_filter(&path(), &filter).filter
    }

    fn matches(index: &FilterIndex, document: Value) -> Vec<FilterId> {
        let flat = FlatDocument::from_value(&document);
        index.evaluate(&path(), &flat)
    }

    // --- basic matching tests ---

    #[test]
    fn test_single_condition_filter() {
        let mut index = FilterIndex::new();
        let id = add(&mut index, json!({ "equals": { "status": "open" } }));

        assert_eq!(matches(&index, json!({ "status": "open" })), vec![id]);
        assert!(matches(&index, json!({ "status": "closed" })).is_empty());
        assert!(matches(&index, json!({ "other": 1 })).is_empty());
    }

    #[test]
    fn test_nested_fields_match_by_dotted_path() {
        let mut index = FilterIndex::new();
        let id = add(&mut index, json!({ "equals": { "address.city": "lyon" } }));

        assert_eq!(
            matches(&index, json!({ "address": { "city": "lyon" } })),
            vec![id]
        );
        assert!(matches(&index, json!({ "address": { "city": "paris" } })).is_empty());
    }

    #[test]
    fn test_conjunction_requires_every_condition() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "and": [
                { "equals": { "status": "open" } },
                { "range": { "priority": { "gte": 3 } } }
            ] }),
        );

        assert_eq!(
            matches(&index, json!({ "status": "open", "priority": 5 })),
            vec![id]
        );
        assert!(matches(&index, json!({ "status": "open", "priority": 1 })).is_empty());
        assert!(matches(&index, json!({ "priority": 5 })).is_empty());
    }

    #[test]
    fn test_disjunction_matches_either_branch() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "or": [
                { "equals": { "status": "open" } },
                { "equals": { "urgent": true } }
            ] }),
        );

        assert_eq!(matches(&index, json!({ "status": "open" })), vec![id]);
        assert_eq!(matches(&index, json!({ "urgent": true })), vec![id]);
        assert_eq!(
            matches(&index, json!({ "status": "open", "urgent": true })),
            vec![id]
        );
        assert!(matches(&index, json!({ "status": "closed", "urgent": false })).is_empty());
    }

    // --- negation tests ---

    #[test]
    fn test_negated_equals() {
        let mut index = FilterIndex::new();
        let id = add(&mut index, json!({ "not": { "equals": { "status": "closed" } } }));

        assert_eq!(matches(&index, json!({ "status": "open" })), vec![id]);
        // a document without the field does not violate the negation
        assert_eq!(matches(&index, json!({ "other": 1 })), vec![id]);
        assert!(matches(&index, json!({ "status": "closed" })).is_empty());
    }

    #[test]
    fn test_missing_matches_absent_and_empty_fields() {
        let mut index = FilterIndex::new();
        let id = add(&mut index, json!({ "missing": "assignee" }));

        assert_eq!(matches(&index, json!({ "status": "open" })), vec![id]);
        assert_eq!(matches(&index, json!({ "assignee": null })), vec![id]);
        assert_eq!(matches(&index, json!({ "assignee": [] })), vec![id]);
        assert!(matches(&index, json!({ "assignee": "bob" })).is_empty());
    }

    #[test]
    fn test_mixed_positive_and_negated_conditions() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "and": [
                { "exists": "status" },
                { "not": { "equals": { "status": "closed" } } }
            ] }),
        );

        assert_eq!(matches(&index, json!({ "status": "open" })), vec![id]);
        assert!(matches(&index, json!({ "status": "closed" })).is_empty());
        // the positive `exists` leg keeps field-less documents out
        assert!(matches(&index, json!({ "other": 1 })).is_empty());
    }

    #[test]
    fn test_de_morgan_negated_conjunction() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "not": { "and": [
                { "equals": { "a": 1 } },
                { "equals": { "b": 2 } }
            ] } }),
        );

        assert_eq!(matches(&index, json!({ "a": 1, "b": 3 })), vec![id]);
        assert_eq!(matches(&index, json!({ "a": 0, "b": 2 })), vec![id]);
        assert_eq!(matches(&index, json!({ "c": 9 })), vec![id]);
        assert!(matches(&index, json!({ "a": 1, "b": 2 })).is_empty());
    }

    // --- operator coverage through the index ---

    #[test]
    fn test_membership_and_regexp_operators() {
        let mut index = FilterIndex::new();
        let tags = add(&mut index, json!({ "in": { "tag": ["urgent", "vip"] } }));
        let name = add(&mut index, json!({ "regexp": { "name": { "value": "^al", "flags": "i" } } }));

        assert_eq!(matches(&index, json!({ "tag": "vip" })), vec![tags]);
        assert_eq!(matches(&index, json!({ "tag": ["spam", "urgent"] })), vec![tags]);
        assert_eq!(matches(&index, json!({ "name": "Alice" })), vec![name]);
        assert!(matches(&index, json!({ "tag": "spam", "name": "bob" })).is_empty());
    }

    #[test]
    fn test_geo_distance_operator() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "geoDistance": { "pos": [0.0, 0.0], "distance": "120km" } }),
        );

        assert_eq!(matches(&index, json!({ "pos": { "lat": 0.0, "lon": 1.0 } })), vec![id]);
        assert!(matches(&index, json!({ "pos": [0.0, 2.0] })).is_empty());
        assert!(matches(&index, json!({ "pos": "garbage" })).is_empty());
    }

    // --- global filter tests ---

    #[test]
    fn test_match_all_filter_sees_every_document() {
        let mut index = FilterIndex::new();
        let all = add(&mut index, json!({}));
        let some = add(&mut index, json!({ "equals": { "a": 1 } }));

        assert_eq!(matches(&index, json!({ "a": 1 })), vec![all, some]);
        assert_eq!(matches(&index, json!({ "b": 2 })), vec![all]);
        assert_eq!(matches(&index, json!({})), vec![all]);
    }

    #[test]
    fn test_other_collections_see_nothing() {
        let mut index = FilterIndex::new();
        add(&mut index, json!({ "equals": { "a": 1 } }));

        let other = CollectionPath::new("ops", "logs");
        let doc = json!({ "a": 1 });
        let flat = FlatDocument::from_value(&doc);
        assert!(index.evaluate(&other, &flat).is_empty());
    }

    // --- shared structure tests ---

    #[test]
    fn test_shared_subfilter_reports_both_filters() {
        let mut index = FilterIndex::new();
        let plain = add(&mut index, json!({ "equals": { "a": 1 } }));
        let union = add(
            &mut index,
            json!({ "or": [{ "equals": { "a": 1 } }, { "equals": { "b": 2 } }] }),
        );

        let mut expected = vec![plain, union];
        expected.sort_unstable();
        assert_eq!(matches(&index, json!({ "a": 1 })), expected);
        assert_eq!(matches(&index, json!({ "b": 2 })), vec![union]);
    }

    // --- scratch reuse tests ---

    #[test]
    fn test_scratch_reuse_carries_no_state_across_passes() {
        let mut index = FilterIndex::new();
        let id = add(
            &mut index,
            json!({ "and": [{ "equals": { "a": 1 } }, { "equals": { "b": 2 } }] }),
        );

        let mut scratch = MatchScratch::new();
        let hit = json!({ "a": 1, "b": 2 });
        let partial = json!({ "a": 1 });

        let flat = FlatDocument::from_value(&hit);
        assert_eq!(index.evaluate_into(&path(), &flat, &mut scratch), vec![id]);

        // a partial document right after a full match must not inherit score
        let flat = FlatDocument::from_value(&partial);
        assert!(index.evaluate_into(&path(), &flat, &mut scratch).is_empty());

        let flat = FlatDocument::from_value(&hit);
        assert_eq!(index.evaluate_into(&path(), &flat, &mut scratch), vec![id]);
    }

    #[test]
    fn test_evaluation_after_release_sees_removed_filter_gone() {
        let mut index = FilterIndex::new();
        let keep = add(&mut index, json!({ "equals": { "a": 1 } }));
        let drop = add(
            &mut index,
            json!({ "or": [{ "equals": { "a": 1 } }, { "exists": "b" }] }),
        );

        index.release_filter(drop).expect("release should succeed");
        assert_eq!(matches(&index, json!({ "a": 1 })), vec![keep]);
        assert!(matches(&index, json!({ "b": "x" })).is_empty());
    }
}
