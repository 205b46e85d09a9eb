//! # Filter DSL
//!
//! Compilation pipeline for JSON filter bodies:
//!
//! ```text
//!   raw body ──parse──▶ FilterAst ──normalize──▶ NormalizedFilter
//!   (serde_json)        (combinator tree)        (canonical DNF)
//! ```
//!
//! Parsing validates structure and operands; normalization pushes negation
//! onto the leaves, expands to disjunctive normal form and assigns canonical
//! content keys at the literal, clause and filter level. Equal keys mean
//! structurally equivalent filters, which is what the index de-duplicates on.
//!
//! ## Types
//!
//! - [`Predicate`] — the closed set of leaf operators
//! - [`NormalizedFilter`] / [`Minterm`] / [`Literal`] — the canonical form
//! - [`CompileLimits`] — complexity caps applied during compilation
//! - [`FilterError`] — everything that can go wrong before the index is
//!   touched

pub mod geo;

mod normalize;
mod operators;
mod parse;

pub use normalize::{CompileLimits, Literal, Minterm, NormalizedFilter};
pub use operators::Predicate;

use serde_json::Value;

/// Errors raised while compiling a filter body.
///
/// Compilation is all-or-nothing: any of these fires before the filter index
/// is mutated in any way.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FilterError {
    /// The keyword is not part of the filter grammar at all.
    #[error("unknown filter keyword `{0}`")]
    UnknownKeyword(String),

    /// The keyword belongs to the wider historical grammar but is not
    /// available in this engine.
    #[error("unsupported filter keyword `{0}`")]
    UnsupportedOperator(String),

    /// The filter body is structurally invalid.
    #[error("invalid filter expression: {0}")]
    InvalidExpression(String),

    /// A keyword received a malformed operand.
    #[error("invalid operand for `{keyword}` on field `{field}`: {reason}")]
    InvalidOperand {
        /// Keyword as written in the filter body.
        keyword: String,
        /// Field the operand applies to.
        field: String,
        /// Human-readable description of the problem.
        reason: String,
    },

    /// A `regexp` pattern failed to compile.
    #[error("invalid regular expression on field `{field}`: {source}")]
    InvalidRegex {
        /// Field the pattern applies to.
        field: String,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The filter holds more distinct conditions than allowed.
    #[error("filter exceeds the condition limit ({count} > {limit})")]
    TooManyConditions {
        /// Distinct conditions found.
        count: usize,
        /// Configured cap.
        limit: usize,
    },

    /// Normalization expanded to more clauses than allowed.
    #[error("filter normalization exceeds the clause limit ({count} > {limit})")]
    TooManyClauses {
        /// Clauses produced.
        count: usize,
        /// Configured cap.
        limit: usize,
    },
}

/// Compiles a raw filter body with [`CompileLimits::default`].
///
/// # Errors
///
/// Returns a [`FilterError`] if the body is structurally invalid, uses an
/// unknown or unsupported keyword, carries a malformed operand, or exceeds
/// the default complexity limits.
pub fn compile(body: &Value) -> Result<NormalizedFilter, FilterError> {
    compile_with_limits(body, &CompileLimits::default())
}

/// Compiles a raw filter body under explicit complexity limits.
///
/// # Errors
///
/// Same as [`compile`], with the given limits applied instead of the
/// defaults.
pub fn compile_with_limits(
    body: &Value,
    limits: &CompileLimits,
) -> Result<NormalizedFilter, FilterError> {
    let ast = parse::parse(body)?;
    normalize::normalize(ast, limits)
}

// ===========================================================================
// Tests
// ===========================================================================
