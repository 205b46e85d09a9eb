//! Filter body parsing.
//!
//! Turns a raw JSON filter body into a [`FilterAst`]: a tree of boolean
//! combinators over leaf predicates. Parsing performs all structural
//! validation (keyword arity, operand shapes, regex and geo syntax) so that
//! a filter either compiles completely or fails before any index state is
//! touched.
//!
//! Grammar, one keyword per object level:
//! - combinators: `and`, `or`, `not`, `must` (= and), `should` (= or),
//!   `bool` with `must` / `should` / `must_not` / `should_not` clauses
//!   (camelCase spellings accepted)
//! - leaves: `equals`/`term`, `in`/`terms`, `range`, `exists`, `missing`,
//!   `regexp`, `geoDistance`, `geoDistanceRange`, `geoBoundingBox`,
//!   `geoPolygon`
//!
//! The empty object `{}` is the match-everything filter and is only legal at
//! the root.

use regex::RegexBuilder;
use serde_json::Value;

use super::geo::{self, BoundingBox, Polygon};
use super::operators::Predicate;
use super::FilterError;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Parsed filter tree, prior to normalization.
#[derive(Debug, Clone)]
pub(crate) enum FilterAst {
    /// The `{}` filter: matches every document of the collection.
    All,
    /// A leaf condition on one field.
    Leaf(Leaf),
    /// Conjunction of sub-filters.
    And(Vec<FilterAst>),
    /// Disjunction of sub-filters.
    Or(Vec<FilterAst>),
    /// Negation of a sub-filter.
    Not(Box<FilterAst>),
}

/// A leaf condition: a predicate applied to a dotted field path.
#[derive(Debug, Clone)]
pub(crate) struct Leaf {
    pub(crate) field: String,
    pub(crate) predicate: Predicate,
}

fn leaf(field: &str, predicate: Predicate) -> FilterAst {
    FilterAst::Leaf(Leaf { field: field.to_string(), predicate })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Parses a raw filter body into an AST.
pub(crate) fn parse(body: &Value) -> Result<FilterAst, FilterError> {
    let map = body.as_object().ok_or_else(|| {
        FilterError::InvalidExpression("filter body must be a JSON object".to_string())
    })?;
    if map.is_empty() {
        return Ok(FilterAst::All);
    }
    if map.len() != 1 {
        return Err(FilterError::InvalidExpression(
            "a filter object must hold exactly one keyword".to_string(),
        ));
    }
    let (keyword, operand) = match map.iter().next() {
        Some(entry) => entry,
        None => {
            return Err(FilterError::InvalidExpression(
                "a filter object must hold exactly one keyword".to_string(),
            ))
        }
    };
    parse_keyword(keyword, operand)
}

fn parse_keyword(keyword: &str, operand: &Value) -> Result<FilterAst, FilterError> {
    match keyword {
        "and" | "must" => Ok(FilterAst::And(parse_clause_array(keyword, operand)?)),
        "or" | "should" => Ok(FilterAst::Or(parse_clause_array(keyword, operand)?)),
        "not" => parse_not(operand),
        "bool" => parse_bool(operand),
        "equals" | "term" => parse_equals(keyword, operand),
        "in" | "terms" => parse_in(keyword, operand),
        "range" => parse_range(operand),
        "exists" => Ok(leaf(&parse_field_path("exists", operand)?, Predicate::Exists)),
        "missing" => {
            let field = parse_field_path("missing", operand)?;
            Ok(FilterAst::Not(Box::new(leaf(&field, Predicate::Exists))))
        }
        "regexp" => parse_regexp(operand),
        "geoDistance" => parse_geo_distance(operand),
        "geoDistanceRange" => parse_geo_distance_range(operand),
        "geoBoundingBox" => parse_geo_bounding_box(operand),
        "geoPolygon" => parse_geo_polygon(operand),
        // part of the wider historical grammar, deliberately not available
        "ids" | "nothing" => Err(FilterError::UnsupportedOperator(keyword.to_string())),
        other => Err(FilterError::UnknownKeyword(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

fn parse_clause_array(keyword: &str, operand: &Value) -> Result<Vec<FilterAst>, FilterError> {
    let items = operand.as_array().ok_or_else(|| {
        FilterError::InvalidExpression(format!("`{keyword}` expects an array of filters"))
    })?;
    if items.is_empty() {
        return Err(FilterError::InvalidExpression(format!(
            "`{keyword}` needs at least one filter"
        )));
    }
    items
        .iter()
        .map(|item| {
            let parsed = parse(item)?;
            if matches!(parsed, FilterAst::All) {
                return Err(FilterError::InvalidExpression(format!(
                    "`{keyword}` accepts only non-empty filters"
                )));
            }
            Ok(parsed)
        })
        .collect()
}

fn parse_not(operand: &Value) -> Result<FilterAst, FilterError> {
    let inner = parse(operand)?;
    if matches!(inner, FilterAst::All) {
        return Err(FilterError::InvalidExpression(
            "cannot negate an empty filter".to_string(),
        ));
    }
    Ok(FilterAst::Not(Box::new(inner)))
}

fn parse_bool(operand: &Value) -> Result<FilterAst, FilterError> {
    let map = operand.as_object().ok_or_else(|| {
        FilterError::InvalidExpression("`bool` expects an object of clauses".to_string())
    })?;

    let mut must = Vec::new();
    let mut should = Vec::new();
    let mut must_not = Vec::new();
    let mut should_not = Vec::new();
    for (clause, items) in map {
        match clause.as_str() {
            "must" => must.extend(parse_clause_array("bool.must", items)?),
            "should" => should.extend(parse_clause_array("bool.should", items)?),
            "must_not" | "mustNot" => {
                must_not.extend(parse_clause_array("bool.must_not", items)?);
            }
            "should_not" | "shouldNot" => {
                should_not.extend(parse_clause_array("bool.should_not", items)?);
            }
            other => {
                return Err(FilterError::InvalidExpression(format!(
                    "unknown `bool` clause `{other}`"
                )))
            }
        }
    }

    // must_not: none of the listed filters may match.
    // should_not: at least one of the listed filters must fail.
    let mut clauses = must;
    if !should.is_empty() {
        clauses.push(FilterAst::Or(should));
    }
    if !must_not.is_empty() {
        clauses.push(FilterAst::Not(Box::new(FilterAst::Or(must_not))));
    }
    if !should_not.is_empty() {
        clauses.push(FilterAst::Not(Box::new(FilterAst::And(should_not))));
    }
    if clauses.is_empty() {
        return Err(FilterError::InvalidExpression(
            "`bool` needs at least one clause".to_string(),
        ));
    }
    Ok(FilterAst::And(clauses))
}

// ---------------------------------------------------------------------------
// Scalar leaves
// ---------------------------------------------------------------------------

fn parse_equals(keyword: &str, operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, value) = single_entry(keyword, operand)?;
    ensure_scalar(keyword, field, value)?;
    Ok(leaf(field, Predicate::Equals(value.clone())))
}

fn parse_in(keyword: &str, operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, value) = single_entry(keyword, operand)?;
    let items = value
        .as_array()
        .ok_or_else(|| invalid_operand(keyword, field, "expected an array of scalar values"))?;
    if items.is_empty() {
        return Err(invalid_operand(keyword, field, "the value list cannot be empty"));
    }
    for item in items {
        ensure_scalar(keyword, field, item)?;
    }
    Ok(leaf(field, Predicate::InSet(items.clone())))
}

fn parse_range(operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, value) = single_entry("range", operand)?;
    let bounds = value.as_object().ok_or_else(|| {
        invalid_operand("range", field, "expected an object with gt/gte/lt/lte bounds")
    })?;
    if bounds.is_empty() {
        return Err(invalid_operand("range", field, "needs at least one bound"));
    }

    let mut gt = None;
    let mut gte = None;
    let mut lt = None;
    let mut lte = None;
    for (bound, raw) in bounds {
        let number = raw.as_f64().ok_or_else(|| {
            invalid_operand("range", field, format!("bound `{bound}` must be a number"))
        })?;
        match bound.as_str() {
            "gt" => gt = Some(number),
            "gte" => gte = Some(number),
            "lt" => lt = Some(number),
            "lte" => lte = Some(number),
            other => {
                return Err(invalid_operand("range", field, format!("unknown bound `{other}`")))
            }
        }
    }
    if gt.is_some() && gte.is_some() {
        return Err(invalid_operand("range", field, "cannot combine `gt` and `gte`"));
    }
    if lt.is_some() && lte.is_some() {
        return Err(invalid_operand("range", field, "cannot combine `lt` and `lte`"));
    }
    Ok(leaf(field, Predicate::Range { gt, gte, lt, lte }))
}

fn parse_field_path(keyword: &str, operand: &Value) -> Result<String, FilterError> {
    let path = match operand {
        Value::String(path) => Some(path.as_str()),
        Value::Object(map) if map.len() == 1 => map.get("field").and_then(Value::as_str),
        _ => None,
    };
    let path = path.ok_or_else(|| {
        FilterError::InvalidExpression(format!(
            "`{keyword}` expects a field path string or an object with a `field` attribute"
        ))
    })?;
    if path.is_empty() {
        return Err(FilterError::InvalidExpression(format!(
            "`{keyword}` field path cannot be empty"
        )));
    }
    Ok(path.to_string())
}

fn parse_regexp(operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, body) = single_entry("regexp", operand)?;
    let (pattern, raw_flags) = match body {
        Value::String(pattern) => (pattern.as_str(), ""),
        Value::Object(map) => {
            let pattern = map.get("value").and_then(Value::as_str).ok_or_else(|| {
                invalid_operand("regexp", field, "expected a `value` attribute holding the pattern")
            })?;
            let flags = match map.get("flags") {
                None => "",
                Some(raw) => raw.as_str().ok_or_else(|| {
                    invalid_operand("regexp", field, "`flags` must be a string")
                })?,
            };
            (pattern, flags)
        }
        _ => {
            return Err(invalid_operand(
                "regexp",
                field,
                "expected a pattern string or a {value, flags} object",
            ))
        }
    };

    let mut flags: Vec<char> = raw_flags.chars().collect();
    flags.sort_unstable();
    flags.dedup();

    let mut builder = RegexBuilder::new(pattern);
    for flag in &flags {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(invalid_operand(
                    "regexp",
                    field,
                    format!("unsupported regex flag `{other}`"),
                ))
            }
        };
    }
    let regex = builder
        .build()
        .map_err(|source| FilterError::InvalidRegex { field: field.to_string(), source })?;
    Ok(leaf(
        field,
        Predicate::Regexp {
            pattern: pattern.to_string(),
            flags: flags.into_iter().collect(),
            regex,
        },
    ))
}

// ---------------------------------------------------------------------------
// Geo leaves
// ---------------------------------------------------------------------------

fn parse_geo_distance(operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, point_value, distance_value) = split_geo_attribute("geoDistance", operand, "distance")?;
    let center = geo::parse_point(point_value)
        .ok_or_else(|| invalid_operand("geoDistance", &field, "expected a geopoint"))?;
    let distance = geo::parse_distance(distance_value)
        .map_err(|reason| invalid_operand("geoDistance", &field, reason))?;
    Ok(leaf(&field, Predicate::GeoDistance { center, distance }))
}

fn parse_geo_distance_range(operand: &Value) -> Result<FilterAst, FilterError> {
    let map = operand.as_object().ok_or_else(|| {
        FilterError::InvalidExpression("`geoDistanceRange` expects an object".to_string())
    })?;
    let from_value = map.get("from").ok_or_else(|| {
        FilterError::InvalidExpression("`geoDistanceRange` needs a `from` distance".to_string())
    })?;
    let to_value = map.get("to").ok_or_else(|| {
        FilterError::InvalidExpression("`geoDistanceRange` needs a `to` distance".to_string())
    })?;

    let mut field_entry = None;
    for (key, value) in map {
        if key == "from" || key == "to" {
            continue;
        }
        if field_entry.is_some() {
            return Err(FilterError::InvalidExpression(
                "`geoDistanceRange` expects exactly one field".to_string(),
            ));
        }
        field_entry = Some((key.as_str(), value));
    }
    let (field, point_value) = field_entry.ok_or_else(|| {
        FilterError::InvalidExpression("`geoDistanceRange` expects exactly one field".to_string())
    })?;

    let center = geo::parse_point(point_value)
        .ok_or_else(|| invalid_operand("geoDistanceRange", field, "expected a geopoint"))?;
    let from = geo::parse_distance(from_value)
        .map_err(|reason| invalid_operand("geoDistanceRange", field, reason))?;
    let to = geo::parse_distance(to_value)
        .map_err(|reason| invalid_operand("geoDistanceRange", field, reason))?;
    if from > to {
        return Err(invalid_operand("geoDistanceRange", field, "`from` cannot exceed `to`"));
    }
    Ok(leaf(field, Predicate::GeoDistanceRange { center, from, to }))
}

fn parse_geo_bounding_box(operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, shape) = single_entry("geoBoundingBox", operand)?;
    let map = shape.as_object().ok_or_else(|| {
        invalid_operand("geoBoundingBox", field, "expected an object describing the box")
    })?;

    let numeric = |key: &str| map.get(key).and_then(Value::as_f64);
    if let (Some(top), Some(left), Some(bottom), Some(right)) =
        (numeric("top"), numeric("left"), numeric("bottom"), numeric("right"))
    {
        return Ok(leaf(field, Predicate::GeoBoundingBox(BoundingBox { top, left, bottom, right })));
    }

    let corner = |camel: &str, snake: &str| map.get(camel).or_else(|| map.get(snake));
    let top_left = corner("topLeft", "top_left")
        .and_then(geo::parse_point);
    let bottom_right = corner("bottomRight", "bottom_right")
        .and_then(geo::parse_point);
    match (top_left, bottom_right) {
        (Some(tl), Some(br)) => Ok(leaf(
            field,
            Predicate::GeoBoundingBox(BoundingBox {
                top: tl.lat,
                left: tl.lon,
                bottom: br.lat,
                right: br.lon,
            }),
        )),
        _ => Err(invalid_operand(
            "geoBoundingBox",
            field,
            "expected top/left/bottom/right numbers or topLeft/bottomRight points",
        )),
    }
}

fn parse_geo_polygon(operand: &Value) -> Result<FilterAst, FilterError> {
    let (field, shape) = single_entry("geoPolygon", operand)?;
    let points = shape
        .as_object()
        .and_then(|map| map.get("points"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            invalid_operand("geoPolygon", field, "expected an object with a `points` array")
        })?;
    if points.len() < 3 {
        return Err(invalid_operand("geoPolygon", field, "a polygon needs at least three points"));
    }
    let vertices = points
        .iter()
        .map(|point| {
            geo::parse_point(point)
                .ok_or_else(|| invalid_operand("geoPolygon", field, "expected a list of geopoints"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(leaf(field, Predicate::GeoPolygon(Polygon::new(vertices))))
}

/// Splits a geo operand of the `{ field: point, attr: value }` shape into
/// its field, point value and named attribute value.
fn split_geo_attribute<'v>(
    keyword: &str,
    operand: &'v Value,
    attribute: &str,
) -> Result<(String, &'v Value, &'v Value), FilterError> {
    let map = operand.as_object().ok_or_else(|| {
        FilterError::InvalidExpression(format!("`{keyword}` expects an object"))
    })?;
    let attribute_value = map.get(attribute).ok_or_else(|| {
        FilterError::InvalidExpression(format!("`{keyword}` needs a `{attribute}` attribute"))
    })?;
    let mut field_entry = None;
    for (key, value) in map {
        if key == attribute {
            continue;
        }
        if field_entry.is_some() {
            return Err(FilterError::InvalidExpression(format!(
                "`{keyword}` expects exactly one field"
            )));
        }
        field_entry = Some((key.clone(), value));
    }
    let (field, point_value) = field_entry.ok_or_else(|| {
        FilterError::InvalidExpression(format!("`{keyword}` expects exactly one field"))
    })?;
    Ok((field, point_value, attribute_value))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn single_entry<'v>(keyword: &str, operand: &'v Value) -> Result<(&'v str, &'v Value), FilterError> {
    let map = operand.as_object().filter(|map| map.len() == 1).ok_or_else(|| {
        FilterError::InvalidExpression(format!(
            "`{keyword}` expects an object with exactly one field"
        ))
    })?;
    match map.iter().next() {
        Some((field, value)) => Ok((field.as_str(), value)),
        None => Err(FilterError::InvalidExpression(format!(
            "`{keyword}` expects an object with exactly one field"
        ))),
    }
}

fn ensure_scalar(keyword: &str, field: &str, value: &Value) -> Result<(), FilterError> {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => Ok(()),
        _ => Err(invalid_operand(
            keyword,
            field,
            "expected a scalar value (string, number, boolean or null)",
        )),
    }
}

fn invalid_operand(keyword: &str, field: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidOperand {
        keyword: keyword.to_string(),
        field: field.to_string(),
        reason: reason.into(),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_err(body: serde_json::Value) -> FilterError {
        match parse(&body) {
            Err(err) => err,
            Ok(ast) => panic!("expected an error, parsed {ast:?}"),
        }
    }

    // --- structure tests ---

    #[test]
    fn test_empty_object_is_match_all() {
        assert!(matches!(parse(&json!({})), Ok(FilterAst::All)));
    }

    #[test]
    fn test_body_must_be_an_object() {
        assert!(matches!(
            parse_err(json!([1, 2])),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(parse_err(json!("x")), FilterError::InvalidExpression(_)));
    }

    #[test]
    fn test_multiple_keywords_rejected() {
        let err = parse_err(json!({ "equals": { "a": 1 }, "exists": "b" }));
        assert!(matches!(err, FilterError::InvalidExpression(_)));
    }

    #[test]
    fn test_unknown_keyword() {
        match parse_err(json!({ "fuzzy": { "a": 1 } })) {
            FilterError::UnknownKeyword(keyword) => assert_eq!(keyword, "fuzzy"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_recognized_but_unsupported_keywords() {
        assert!(matches!(
            parse_err(json!({ "ids": { "values": ["a"] } })),
            FilterError::UnsupportedOperator(_)
        ));
        assert!(matches!(
            parse_err(json!({ "nothing": {} })),
            FilterError::UnsupportedOperator(_)
        ));
    }

    // --- combinator tests ---

    #[test]
    fn test_and_or_aliases() {
        assert!(matches!(
            parse(&json!({ "and": [{ "exists": "a" }, { "exists": "b" }] })),
            Ok(FilterAst::And(items)) if items.len() == 2
        ));
        assert!(matches!(
            parse(&json!({ "must": [{ "exists": "a" }] })),
            Ok(FilterAst::And(_))
        ));
        assert!(matches!(
            parse(&json!({ "should": [{ "exists": "a" }, { "exists": "b" }] })),
            Ok(FilterAst::Or(_))
        ));
    }

    #[test]
    fn test_combinators_reject_empty_and_non_filter_items() {
        assert!(matches!(
            parse_err(json!({ "and": [] })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse_err(json!({ "or": [{}] })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse_err(json!({ "and": { "exists": "a" } })),
            FilterError::InvalidExpression(_)
        ));
    }

    #[test]
    fn test_not_rejects_empty_filter() {
        assert!(matches!(
            parse_err(json!({ "not": {} })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse(&json!({ "not": { "exists": "a" } })),
            Ok(FilterAst::Not(_))
        ));
    }

    #[test]
    fn test_bool_clauses() {
        let ast = parse(&json!({
            "bool": {
                "must": [{ "exists": "a" }],
                "should": [{ "exists": "b" }, { "exists": "c" }],
                "mustNot": [{ "exists": "d" }],
                "should_not": [{ "exists": "e" }]
            }
        }));
        let FilterAst::And(clauses) = ast.expect("bool should parse") else {
            panic!("expected a conjunction")
        };
        assert_eq!(clauses.len(), 4);
    }

    #[test]
    fn test_bool_rejects_unknown_clause_and_empty_body() {
        assert!(matches!(
            parse_err(json!({ "bool": { "filter": [] } })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse_err(json!({ "bool": {} })),
            FilterError::InvalidExpression(_)
        ));
    }

    // --- scalar leaf tests ---

    #[test]
    fn test_equals_and_term_parse_to_the_same_predicate() {
        let a = parse(&json!({ "equals": { "status": "open" } })).expect("equals");
        let b = parse(&json!({ "term": { "status": "open" } })).expect("term");
        match (a, b) {
            (FilterAst::Leaf(a), FilterAst::Leaf(b)) => {
                assert_eq!(a.predicate.name(), "equals");
                assert_eq!(b.predicate.name(), "equals");
                assert_eq!(a.field, b.field);
            }
            other => panic!("unexpected parse {other:?}"),
        }
    }

    #[test]
    fn test_equals_rejects_non_scalar_operands() {
        assert!(matches!(
            parse_err(json!({ "equals": { "a": [1, 2] } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "equals": { "a": { "b": 1 } } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_in_requires_non_empty_scalar_array() {
        assert!(parse(&json!({ "in": { "tag": ["a", "b"] } })).is_ok());
        assert!(parse(&json!({ "terms": { "tag": ["a"] } })).is_ok());
        assert!(matches!(
            parse_err(json!({ "in": { "tag": [] } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "in": { "tag": "a" } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_range_bounds_validation() {
        assert!(parse(&json!({ "range": { "age": { "gte": 18, "lt": 65 } } })).is_ok());
        assert!(matches!(
            parse_err(json!({ "range": { "age": {} } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "range": { "age": { "gt": 1, "gte": 2 } } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "range": { "age": { "gte": "18" } } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "range": { "age": { "between": 5 } } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_exists_shorthand_forms() {
        assert!(matches!(
            parse(&json!({ "exists": "a.b" })),
            Ok(FilterAst::Leaf(_))
        ));
        assert!(matches!(
            parse(&json!({ "exists": { "field": "a.b" } })),
            Ok(FilterAst::Leaf(_))
        ));
        assert!(matches!(
            parse_err(json!({ "exists": 42 })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse_err(json!({ "exists": "" })),
            FilterError::InvalidExpression(_)
        ));
    }

    #[test]
    fn test_missing_parses_to_negated_exists() {
        match parse(&json!({ "missing": "a" })) {
            Ok(FilterAst::Not(inner)) => {
                assert!(matches!(*inner, FilterAst::Leaf(_)));
            }
            other => panic!("unexpected parse {other:?}"),
        }
    }

    // --- regexp tests ---

    #[test]
    fn test_regexp_forms_and_flags() {
        assert!(parse(&json!({ "regexp": { "name": "^a.*$" } })).is_ok());
        let ast = parse(&json!({ "regexp": { "name": { "value": "^a", "flags": "si" } } }))
            .expect("regexp with flags");
        match ast {
            FilterAst::Leaf(leaf) => match leaf.predicate {
                Predicate::Regexp { flags, .. } => assert_eq!(flags, "is"),
                other => panic!("unexpected predicate {other:?}"),
            },
            other => panic!("unexpected parse {other:?}"),
        }
    }

    #[test]
    fn test_regexp_rejects_bad_patterns_and_flags() {
        assert!(matches!(
            parse_err(json!({ "regexp": { "name": "[unclosed" } })),
            FilterError::InvalidRegex { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "regexp": { "name": { "value": "a", "flags": "g" } } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "regexp": { "name": 42 } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    // --- geo leaf tests ---

    #[test]
    fn test_geo_distance_parses_field_and_distance() {
        let ast = parse(&json!({
            "geoDistance": { "pos": { "lat": 43.6, "lon": 3.9 }, "distance": "500m" }
        }));
        match ast {
            Ok(FilterAst::Leaf(leaf)) => {
                assert_eq!(leaf.field, "pos");
                assert!(matches!(leaf.predicate, Predicate::GeoDistance { distance, .. } if (distance - 500.0).abs() < 1e-9));
            }
            other => panic!("unexpected parse {other:?}"),
        }
    }

    #[test]
    fn test_geo_distance_errors() {
        assert!(matches!(
            parse_err(json!({ "geoDistance": { "pos": [0.0, 0.0] } })),
            FilterError::InvalidExpression(_)
        ));
        assert!(matches!(
            parse_err(json!({ "geoDistance": { "pos": "nowhere", "distance": "1km" } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "geoDistance": { "pos": [0.0, 0.0], "distance": "1 smoot" } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_geo_distance_range_orders_bounds() {
        assert!(parse(&json!({
            "geoDistanceRange": { "pos": [0.0, 0.0], "from": "1km", "to": "2km" }
        }))
        .is_ok());
        assert!(matches!(
            parse_err(json!({
                "geoDistanceRange": { "pos": [0.0, 0.0], "from": "2km", "to": "1km" }
            })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_geo_bounding_box_both_shapes() {
        assert!(parse(&json!({
            "geoBoundingBox": { "pos": { "top": 10.0, "left": 0.0, "bottom": 0.0, "right": 10.0 } }
        }))
        .is_ok());
        assert!(parse(&json!({
            "geoBoundingBox": { "pos": { "topLeft": [10.0, 0.0], "bottomRight": [0.0, 10.0] } }
        }))
        .is_ok());
        assert!(matches!(
            parse_err(json!({ "geoBoundingBox": { "pos": { "top": 1.0 } } })),
            FilterError::InvalidOperand { .. }
        ));
    }

    #[test]
    fn test_geo_polygon_needs_three_points() {
        assert!(parse(&json!({
            "geoPolygon": { "pos": { "points": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]] } }
        }))
        .is_ok());
        assert!(matches!(
            parse_err(json!({ "geoPolygon": { "pos": { "points": [[0.0, 0.0], [0.0, 1.0]] } } })),
            FilterError::InvalidOperand { .. }
        ));
        assert!(matches!(
            parse_err(json!({ "geoPolygon": { "pos": [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]] } })),
            FilterError::InvalidOperand { .. }
        ));
    }
}
