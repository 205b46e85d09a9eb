//! Leaf predicate evaluation.
//!
//! [`Predicate`] is the closed set of field-level tests a filter can express.
//! Each predicate is a total function over a document field value: malformed
//! or mistyped values never error, they simply do not match. Negation is not
//! a predicate concern; it is carried as a flag on the compiled condition and
//! resolved by the matching engine.
//!
//! Operator aliases (`term`/`equals`, `terms`/`in`) are collapsed by the
//! parser before a predicate is built, so structurally equivalent filters
//! written with either spelling share one compiled form.

use regex::Regex;
use serde_json::Value;

use super::geo::{self, BoundingBox, GeoPoint, Polygon};

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A single field-level test, the leaf of every compiled filter.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Field equals a scalar constant: `equals` / `term`.
    ///
    /// Scalar-only on both sides. Array-valued document fields never match;
    /// membership is what [`Predicate::InSet`] is for.
    Equals(Value),
    /// Field value is one of a set of scalars: `in` / `terms`.
    ///
    /// Array-valued document fields match if any element is in the set.
    InSet(Vec<Value>),
    /// Numeric range test with optional bounds: `range`.
    ///
    /// Applies only to numeric document values; no coercion from strings.
    Range {
        /// Exclusive lower bound.
        gt: Option<f64>,
        /// Inclusive lower bound.
        gte: Option<f64>,
        /// Exclusive upper bound.
        lt: Option<f64>,
        /// Inclusive upper bound.
        lte: Option<f64>,
    },
    /// Field is present and carries a usable value: `exists`.
    ///
    /// `null`, empty objects, empty arrays and arrays holding only nulls do
    /// not count as existing. `missing` compiles to this predicate under a
    /// negated condition.
    Exists,
    /// Field matches a regular expression: `regexp`.
    Regexp {
        /// The raw pattern as supplied by the filter.
        pattern: String,
        /// Flags in canonical (sorted) order, possibly empty.
        flags: String,
        /// Compiled pattern used at match time.
        regex: Regex,
    },
    /// Field is a point within a radius of a center: `geoDistance`.
    GeoDistance {
        /// Center of the circle.
        center: GeoPoint,
        /// Radius in meters, inclusive.
        distance: f64,
    },
    /// Field is a point within a ring around a center: `geoDistanceRange`.
    GeoDistanceRange {
        /// Center of the ring.
        center: GeoPoint,
        /// Inner radius in meters, inclusive.
        from: f64,
        /// Outer radius in meters, inclusive.
        to: f64,
    },
    /// Field is a point inside a lat/lon box: `geoBoundingBox`.
    GeoBoundingBox(BoundingBox),
    /// Field is a point inside a polygon: `geoPolygon`.
    GeoPolygon(Polygon),
}

impl Predicate {
    /// Canonical operator name, used in content keys and introspection.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Equals(_) => "equals",
            Predicate::InSet(_) => "in",
            Predicate::Range { .. } => "range",
            Predicate::Exists => "exists",
            Predicate::Regexp { .. } => "regexp",
            Predicate::GeoDistance { .. } => "geodistance",
            Predicate::GeoDistanceRange { .. } => "geodistancerange",
            Predicate::GeoBoundingBox(_) => "geoboundingbox",
            Predicate::GeoPolygon(_) => "geopolygon",
        }
    }

    /// Evaluates the predicate against a document field value.
    ///
    /// Total: returns `false` for values the operator does not apply to.
    /// This runs on the matching hot path.
    #[inline]
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Equals(expected) => scalar_eq(value, expected),
            Predicate::InSet(allowed) => match value {
                Value::Array(items) => items
                    .iter()
                    .any(|item| allowed.iter().any(|candidate| scalar_eq(item, candidate))),
                scalar => allowed.iter().any(|candidate| scalar_eq(scalar, candidate)),
            },
            Predicate::Range { gt, gte, lt, lte } => value.as_f64().is_some_and(|number| {
                gt.is_none_or(|bound| number > bound)
                    && gte.is_none_or(|bound| number >= bound)
                    && lt.is_none_or(|bound| number < bound)
                    && lte.is_none_or(|bound| number <= bound)
            }),
            Predicate::Exists => has_substance(value),
            Predicate::Regexp { regex, .. } => {
                value.as_str().is_some_and(|text| regex.is_match(text))
            }
            Predicate::GeoDistance { center, distance } => geo::parse_point(value)
                .is_some_and(|point| center.distance_to(point) <= *distance),
            Predicate::GeoDistanceRange { center, from, to } => {
                geo::parse_point(value).is_some_and(|point| {
                    let d = center.distance_to(point);
                    d >= *from && d <= *to
                })
            }
            Predicate::GeoBoundingBox(bbox) => {
                geo::parse_point(value).is_some_and(|point| bbox.contains(point))
            }
            Predicate::GeoPolygon(polygon) => {
                geo::parse_point(value).is_some_and(|point| polygon.contains(point))
            }
        }
    }

    /// Canonical rendering of the operand, stable across equivalent
    /// spellings of the same filter.
    pub(crate) fn canonical_operand(&self) -> String {
        match self {
            Predicate::Equals(value) => canonical_scalar(value),
            Predicate::InSet(values) => {
                let mut keys: Vec<String> = values.iter().map(canonical_scalar).collect();
                keys.sort_unstable();
                keys.dedup();
                keys.join(",")
            }
            Predicate::Range { gt, gte, lt, lte } => {
                let mut parts = Vec::with_capacity(2);
                if let Some(bound) = gt {
                    parts.push(format!("gt{bound}"));
                }
                if let Some(bound) = gte {
                    parts.push(format!("gte{bound}"));
                }
                if let Some(bound) = lt {
                    parts.push(format!("lt{bound}"));
                }
                if let Some(bound) = lte {
                    parts.push(format!("lte{bound}"));
                }
                parts.join(",")
            }
            Predicate::Exists => String::new(),
            Predicate::Regexp { pattern, flags, .. } => format!("{pattern}\u{1f}{flags}"),
            Predicate::GeoDistance { center, distance } => {
                format!("{},{},{distance}", center.lat, center.lon)
            }
            Predicate::GeoDistanceRange { center, from, to } => {
                format!("{},{},{from},{to}", center.lat, center.lon)
            }
            Predicate::GeoBoundingBox(bbox) => {
                format!("{},{},{},{}", bbox.top, bbox.left, bbox.bottom, bbox.right)
            }
            Predicate::GeoPolygon(polygon) => {
                let mut key = String::new();
                for vertex in polygon.vertices() {
                    key.push_str(&format!("{},{};", vertex.lat, vertex.lon));
                }
                key
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

/// Scalar equality with numeric awareness: `5` and `5.0` are the same
/// number even though their JSON representations differ.
#[inline]
pub(crate) fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Canonical text form of a scalar operand. Numbers go through `f64` so
/// integer and float spellings of the same value collapse together.
pub(crate) fn canonical_scalar(value: &Value) -> String {
    match value {
        Value::Number(number) => number
            .as_f64()
            .map_or_else(|| number.to_string(), |float| float.to_string()),
        other => other.to_string(),
    }
}

fn has_substance(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => items.iter().any(|item| !item.is_null()),
        _ => true,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
