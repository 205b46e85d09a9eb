//! Flattened document views.
//!
//! The matching engine never walks nested JSON: documents are presented as a
//! flat map from dotted field paths to values, and the filter index is keyed
//! by those same paths. [`FlatDocument`] borrows the underlying
//! `serde_json::Value` tree, so building one allocates only the path strings.
//!
//! Flattening rules:
//! - nested objects contribute one entry per dotted path
//!   (`{"a": {"b": 1}}` yields `a.b`)
//! - non-empty objects are *also* kept under their own path (`a` above), so
//!   existence and geo conditions on object-valued fields keep working
//! - arrays are leaf values, never flattened element-wise

use fxhash::FxHashMap;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// FlatDocument
// ---------------------------------------------------------------------------

/// A document flattened to dotted field paths, borrowing the source value.
///
/// This is the only document shape the matching engine understands. Callers
/// that already hold a flat path map can wrap it with
/// [`FlatDocument::from_flat_map`] and skip the traversal.
#[derive(Debug, Clone)]
pub struct FlatDocument<'a> {
    fields: FxHashMap<String, &'a Value>,
}

impl<'a> FlatDocument<'a> {
    /// Flattens a JSON document.
    ///
    /// Non-object roots produce an empty view: there are no field paths to
    /// match against, so only match-everything filters can see such writes.
    #[must_use]
    pub fn from_value(document: &'a Value) -> Self {
        let mut fields = FxHashMap::default();
        if let Value::Object(object) = document {
            flatten_object(None, object, &mut fields);
        }
        Self { fields }
    }

    /// Wraps a map whose keys are already dotted field paths.
    ///
    /// The keys are trusted as-is; no further flattening happens, even for
    /// object values.
    #[must_use]
    pub fn from_flat_map(map: &'a Map<String, Value>) -> Self {
        let mut fields =
            FxHashMap::with_capacity_and_hasher(map.len(), fxhash::FxBuildHasher::default());
        for (path, value) in map {
            fields.insert(path.clone(), value);
        }
        Self { fields }
    }

    /// Returns the value stored under a dotted field path, if present.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        self.fields.get(path).copied()
    }

    /// Whether the document carries the given field path.
    #[must_use]
    pub fn contains_field(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    /// Iterates over `(path, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'a Value)> {
        self.fields.iter().map(|(path, value)| (path.as_str(), *value))
    }

    /// Number of flattened field paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the view holds no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn flatten_object<'a>(
    prefix: Option<&str>,
    object: &'a Map<String, Value>,
    out: &mut FxHashMap<String, &'a Value>,
) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        if let Value::Object(nested) = value {
            if !nested.is_empty() {
                flatten_object(Some(&path), nested, out);
            }
        }
        out.insert(path, value);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
