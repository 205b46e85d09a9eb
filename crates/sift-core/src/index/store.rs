//! Arena-backed storage for compiled filters.
//!
//! [`FilterIndex`] owns three arenas (conditions, subfilters, filters) plus
//! one lookup table per registered collection. Every structure is shared and
//! reference counted through back-references:
//!
//! ```text
//!   Condition ──(used by)──▶ Subfilter ──(used by)──▶ Filter ──refs──▶ subscribers
//!        ▲                        ▲
//!        └── field lookup table   └── pure-negative / match-all lists
//! ```
//!
//! Identical conditions, subfilters and whole filters are de-duplicated by
//! their canonical content keys, so a thousand subscribers to the same
//! expression cost one compiled filter with `refs == 1000`. Releasing the
//! last reference cascades: the filter frees its subfilters where it held
//! the last back-reference, those free their conditions the same way, field
//! entries disappear with their last condition, and the collection entry
//! disappears with its last filter. There is no garbage collection pass;
//! the refcounts are the whole story.

use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::dsl::{NormalizedFilter, Predicate};

use super::ids::{CollectionPath, ConditionId, FilterId, SubfilterId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by filter index operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The filter id does not refer to a live filter.
    #[error("filter not found: {0}")]
    FilterNotFound(FilterId),
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Slot arena with a free list. Ids are slot positions; freed slots are
/// reused on the next insert.
#[derive(Debug)]
pub(super) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), live: 0 }
    }

    #[allow(clippy::cast_possible_truncation)] // slot counts stay far below u32::MAX
    fn insert(&mut self, value: T) -> u32 {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(value);
            slot
        } else {
            self.slots.push(Some(value));
            (self.slots.len() - 1) as u32
        }
    }

    pub(super) fn get(&self, slot: u32) -> Option<&T> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, slot: u32) -> Option<&mut T> {
        self.slots.get_mut(slot as usize).and_then(Option::as_mut)
    }

    fn remove(&mut self, slot: u32) -> Option<T> {
        let value = self.slots.get_mut(slot as usize).and_then(Option::take);
        if value.is_some() {
            self.free.push(slot);
            self.live -= 1;
        }
        value
    }

    fn len(&self) -> usize {
        self.live
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(super) struct ConditionSlot {
    pub(super) field: String,
    pub(super) predicate: Predicate,
    pub(super) negated: bool,
    key: String,
    /// Subfilters using this condition; doubles as its reference count.
    pub(super) subfilters: SmallVec<[SubfilterId; 4]>,
}

#[derive(Debug)]
pub(super) struct SubfilterSlot {
    key: String,
    conditions: SmallVec<[ConditionId; 4]>,
    /// Score a document must reach for this clause to be satisfied, equal
    /// to the clause's literal count.
    pub(super) required: u32,
    /// Number of negated literals; the starting score of every pass.
    pub(super) negated: u32,
    /// Filters using this subfilter; doubles as its reference count.
    pub(super) filters: SmallVec<[FilterId; 2]>,
}

#[derive(Debug)]
struct FilterSlot {
    path: CollectionPath,
    key: String,
    subfilters: SmallVec<[SubfilterId; 4]>,
    /// Number of subscribers currently registered with this expression.
    refs: u32,
}

/// Per-collection lookup tables.
#[derive(Debug, Default)]
pub(super) struct CollectionIndex {
    /// Field path to the conditions testing it.
    pub(super) fields: FxHashMap<String, SmallVec<[ConditionId; 8]>>,
    conditions_by_key: FxHashMap<String, ConditionId>,
    subfilters_by_key: FxHashMap<String, SubfilterId>,
    filters_by_key: FxHashMap<String, FilterId>,
    /// Filters that match every document of the collection.
    pub(super) global_filters: FxHashSet<FilterId>,
    /// Subfilters made solely of negated literals: they match documents
    /// that touch none of their fields.
    pub(super) pure_negative: FxHashSet<SubfilterId>,
    filters: FxHashSet<FilterId>,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of registering a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// Handle of the stored filter.
    pub filter: FilterId,
    /// `false` when an equivalent filter already existed and only its
    /// reference count moved.
    pub created: bool,
}

/// Result of releasing one reference to a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Whether this release removed the filter and cascaded.
    pub removed: bool,
    /// References still held after the release.
    pub remaining_refs: u32,
}

// ---------------------------------------------------------------------------
// FilterIndex
// ---------------------------------------------------------------------------

/// The filter store: every registered filter of every collection, plus the
/// lookup tables the matching engine walks.
///
/// Mutation takes `&mut self`; evaluation (see the matching module) takes
/// `&self` and a caller-owned scratch buffer. The struct is plain data with
/// no interior mutability, callers pick the synchronization.
#[derive(Debug)]
pub struct FilterIndex {
    pub(super) collections: FxHashMap<CollectionPath, CollectionIndex>,
    pub(super) conditions: Arena<ConditionSlot>,
    pub(super) subfilters: Arena<SubfilterSlot>,
    filters: Arena<FilterSlot>,
}

impl Default for FilterIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: FxHashMap::default(),
            conditions: Arena::new(),
            subfilters: Arena::new(),
            filters: Arena::new(),
        }
    }

    /// Looks up a registered filter by its canonical content key.
    #[must_use]
    pub fn find_filter(&self, path: &CollectionPath, canonical_key: &str) -> Option<FilterId> {
        self.collections
            .get(path)?
            .filters_by_key
            .get(canonical_key)
            .copied()
    }

    /// Registers a compiled filter for a collection.
    ///
    /// An equivalent filter (same canonical key) is never stored twice: the
    /// existing one gains a reference instead. Each successful call must be
    /// paired with one [`FilterIndex::release_filter`].
    pub fn add_filter(&mut self, path: &CollectionPath, filter: &NormalizedFilter) -> AddOutcome {
        if let Some(existing) = self.find_filter(path, filter.canonical_key()) {
            if let Some(slot) = self.filters.get_mut(existing.0) {
                slot.refs += 1;
                tracing::trace!("filter {} reused ({} refs)", existing, slot.refs);
            }
            return AddOutcome { filter: existing, created: false };
        }

        let id = FilterId(self.filters.insert(FilterSlot {
            path: path.clone(),
            key: filter.canonical_key().to_string(),
            subfilters: SmallVec::new(),
            refs: 1,
        }));

        let coll = self.collections.entry(path.clone()).or_default();
        let mut members: SmallVec<[SubfilterId; 4]> = SmallVec::new();
        for minterm in filter.minterms() {
            let sid = match coll.subfilters_by_key.get(minterm.canonical_key()) {
                Some(&sid) => {
                    if let Some(slot) = self.subfilters.get_mut(sid.0) {
                        slot.filters.push(id);
                    }
                    sid
                }
                None => {
                    let sid = SubfilterId(self.subfilters.insert(SubfilterSlot {
                        key: minterm.canonical_key().to_string(),
                        conditions: SmallVec::new(),
                        required: literal_count(minterm.literals().len()),
                        negated: literal_count(minterm.negated_count()),
                        filters: SmallVec::from_slice(&[id]),
                    }));
                    let mut condition_ids: SmallVec<[ConditionId; 4]> =
                        SmallVec::with_capacity(minterm.literals().len());
                    for literal in minterm.literals() {
                        let cid = match coll.conditions_by_key.get(literal.canonical_key()) {
                            Some(&cid) => {
                                if let Some(slot) = self.conditions.get_mut(cid.0) {
                                    slot.subfilters.push(sid);
                                }
                                cid
                            }
                            None => {
                                let cid = ConditionId(self.conditions.insert(ConditionSlot {
                                    field: literal.field().to_string(),
                                    predicate: literal.predicate().clone(),
                                    negated: literal.negated(),
                                    key: literal.canonical_key().to_string(),
                                    subfilters: SmallVec::from_slice(&[sid]),
                                }));
                                coll.conditions_by_key
                                    .insert(literal.canonical_key().to_string(), cid);
                                coll.fields
                                    .entry(literal.field().to_string())
                                    .or_default()
                                    .push(cid);
                                cid
                            }
                        };
                        condition_ids.push(cid);
                    }
                    if let Some(slot) = self.subfilters.get_mut(sid.0) {
                        slot.conditions = condition_ids;
                    }
                    if !minterm.literals().is_empty()
                        && minterm.negated_count() == minterm.literals().len()
                    {
                        coll.pure_negative.insert(sid);
                    }
                    coll.subfilters_by_key
                        .insert(minterm.canonical_key().to_string(), sid);
                    sid
                }
            };
            members.push(sid);
        }
        tracing::debug!("filter {} stored for {} ({} subfilters)", id, path, members.len());

        if let Some(slot) = self.filters.get_mut(id.0) {
            slot.subfilters = members;
        }
        coll.filters_by_key.insert(filter.canonical_key().to_string(), id);
        coll.filters.insert(id);
        if filter.is_match_all() {
            coll.global_filters.insert(id);
        }
        AddOutcome { filter: id, created: true }
    }

    /// Releases one reference to a filter, tearing it down at zero.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::FilterNotFound`] if the id is not live.
    pub fn release_filter(&mut self, id: FilterId) -> Result<ReleaseOutcome, IndexError> {
        {
            let slot = self.filters.get_mut(id.0).ok_or(IndexError::FilterNotFound(id))?;
            if slot.refs > 1 {
                slot.refs -= 1;
                return Ok(ReleaseOutcome { removed: false, remaining_refs: slot.refs });
            }
        }
        match self.filters.remove(id.0) {
            Some(slot) => {
                tracing::debug!("filter {} released from {}", id, slot.path);
                self.drop_filter_slot(id, slot);
                Ok(ReleaseOutcome { removed: true, remaining_refs: 0 })
            }
            None => Err(IndexError::FilterNotFound(id)),
        }
    }

    fn drop_filter_slot(&mut self, id: FilterId, slot: FilterSlot) {
        let Some(coll) = self.collections.get_mut(&slot.path) else {
            return;
        };
        coll.filters_by_key.remove(&slot.key);
        coll.filters.remove(&id);
        coll.global_filters.remove(&id);
        for sid in slot.subfilters {
            release_subfilter(coll, &mut self.conditions, &mut self.subfilters, id, sid);
        }
        if coll.filters.is_empty() {
            self.collections.remove(&slot.path);
        }
    }

    // --- introspection -----------------------------------------------------

    /// Canonical content key of a live filter.
    #[must_use]
    pub fn filter_key(&self, id: FilterId) -> Option<&str> {
        self.filters.get(id.0).map(|slot| slot.key.as_str())
    }

    /// Collection a live filter is scoped to.
    #[must_use]
    pub fn filter_path(&self, id: FilterId) -> Option<&CollectionPath> {
        self.filters.get(id.0).map(|slot| &slot.path)
    }

    /// Current subscriber reference count of a live filter.
    #[must_use]
    pub fn filter_refs(&self, id: FilterId) -> Option<u32> {
        self.filters.get(id.0).map(|slot| slot.refs)
    }

    /// Whether the id refers to a live filter.
    #[must_use]
    pub fn contains_filter(&self, id: FilterId) -> bool {
        self.filters.get(id.0).is_some()
    }

    /// Number of live filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of live subfilters.
    #[must_use]
    pub fn subfilter_count(&self) -> usize {
        self.subfilters.len()
    }

    /// Number of live conditions.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Collections that currently hold at least one filter, sorted.
    #[must_use]
    pub fn collections(&self) -> Vec<CollectionPath> {
        let mut paths: Vec<CollectionPath> = self.collections.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether nothing at all is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.len() == 0 && self.collections.is_empty()
    }
}

fn release_subfilter(
    coll: &mut CollectionIndex,
    conditions: &mut Arena<ConditionSlot>,
    subfilters: &mut Arena<SubfilterSlot>,
    filter: FilterId,
    sid: SubfilterId,
) {
    let Some(slot) = subfilters.get_mut(sid.0) else {
        return;
    };
    if let Some(pos) = slot.filters.iter().position(|f| *f == filter) {
        slot.filters.swap_remove(pos);
    }
    if !slot.filters.is_empty() {
        return;
    }
    let Some(slot) = subfilters.remove(sid.0) else {
        return;
    };
    coll.subfilters_by_key.remove(&slot.key);
    coll.pure_negative.remove(&sid);
    for cid in slot.conditions {
        release_condition(coll, conditions, sid, cid);
    }
}

fn release_condition(
    coll: &mut CollectionIndex,
    conditions: &mut Arena<ConditionSlot>,
    sid: SubfilterId,
    cid: ConditionId,
) {
    let Some(slot) = conditions.get_mut(cid.0) else {
        return;
    };
    if let Some(pos) = slot.subfilters.iter().position(|s| *s == sid) {
        slot.subfilters.swap_remove(pos);
    }
    if !slot.subfilters.is_empty() {
        return;
    }
    let Some(slot) = conditions.remove(cid.0) else {
        return;
    };
    coll.conditions_by_key.remove(&slot.key);
    if let Some(field_conditions) = coll.fields.get_mut(&slot.field) {
        if let Some(pos) = field_conditions.iter().position(|c| *c == cid) {
            field_conditions.swap_remove(pos);
        }
        if field_conditions.is_empty() {
            coll.fields.remove(&slot.field);
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // literal counts are capped well below u32::MAX
fn literal_count(count: usize) -> u32 {
    count as u32
}

// ===========================================================================
// Tests
// ===========================================================================
