//! Negation push-down and disjunctive normalization.
//!
//! A parsed [`FilterAst`] is rewritten into a canonical disjunctive normal
//! form: a set of [`Minterm`]s (conjunctive clauses), each holding
//! [`Literal`]s (a predicate on a field, possibly negated). Negation is
//! pushed onto the leaves with De Morgan's laws, so combinators never
//! survive normalization.
//!
//! Canonical ordering is what makes structural de-duplication work: literals
//! sort by their content key inside a minterm, minterms sort by their joined
//! keys inside the filter, and the filter's own key is built from that
//! ordering. Reordered `and`/`or` operands, alias spellings and equivalent
//! `bool` forms all collapse to the same key.

use fxhash::FxHashSet;

use super::operators::Predicate;
use super::parse::{FilterAst, Leaf};
use super::FilterError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Complexity caps applied while a filter compiles.
///
/// A value of `0` disables the corresponding cap. Violations surface as
/// [`FilterError::TooManyConditions`] / [`FilterError::TooManyClauses`]
/// before any index state is touched.
#[derive(Debug, Clone, Copy)]
pub struct CompileLimits {
    /// Maximum number of distinct conditions in one filter.
    pub max_conditions: usize,
    /// Maximum number of conjunctive clauses the normal form may expand to.
    /// Intermediate products of the expansion count against this cap.
    pub max_minterms: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self { max_conditions: 128, max_minterms: 256 }
    }
}

// ---------------------------------------------------------------------------
// Normal form
// ---------------------------------------------------------------------------

/// One predicate on one field, with its negation flag and content key.
#[derive(Debug, Clone)]
pub struct Literal {
    field: String,
    predicate: Predicate,
    negated: bool,
    key: String,
}

impl Literal {
    fn new(field: String, predicate: Predicate, negated: bool) -> Self {
        let key = format!(
            "{}{}\u{1f}{:?}\u{1f}{}",
            if negated { "!" } else { "" },
            predicate.name(),
            field,
            predicate.canonical_operand()
        );
        Self { field, predicate, negated, key }
    }

    /// Dotted path of the document field this literal tests.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The predicate applied to the field.
    #[must_use]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Whether the predicate's outcome is negated.
    #[must_use]
    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Content key identifying this literal across filters.
    #[must_use]
    pub fn canonical_key(&self) -> &str {
        &self.key
    }
}

/// A conjunctive clause of the normal form.
#[derive(Debug, Clone)]
pub struct Minterm {
    literals: Vec<Literal>,
    key: String,
}

impl Minterm {
    fn new(mut literals: Vec<Literal>) -> Self {
        literals.sort_by(|a, b| a.key.cmp(&b.key));
        literals.dedup_by(|a, b| a.key == b.key);
        let key = literals
            .iter()
            .map(Literal::canonical_key)
            .collect::<Vec<_>>()
            .join("\u{1d}");
        Self { literals, key }
    }

    /// The clause's literals in canonical order.
    #[must_use]
    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// Content key identifying this clause across filters.
    #[must_use]
    pub fn canonical_key(&self) -> &str {
        &self.key
    }

    /// Number of negated literals in the clause.
    #[must_use]
    pub fn negated_count(&self) -> usize {
        self.literals.iter().filter(|literal| literal.negated).count()
    }
}

/// A filter in canonical disjunctive normal form.
///
/// The match-everything filter normalizes to a single empty minterm.
#[derive(Debug, Clone)]
pub struct NormalizedFilter {
    minterms: Vec<Minterm>,
    key: String,
}

impl NormalizedFilter {
    /// The disjunction's clauses in canonical order.
    #[must_use]
    pub fn minterms(&self) -> &[Minterm] {
        &self.minterms
    }

    /// Content key identifying this filter: equal keys mean structurally
    /// equivalent filters.
    #[must_use]
    pub fn canonical_key(&self) -> &str {
        &self.key
    }

    /// Whether this is the match-everything filter.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.minterms.len() == 1 && self.minterms[0].literals.is_empty()
    }

    /// Number of distinct conditions across all clauses.
    #[must_use]
    pub fn condition_count(&self) -> usize {
        let distinct: FxHashSet<&str> = self
            .minterms
            .iter()
            .flat_map(|minterm| minterm.literals.iter().map(Literal::canonical_key))
            .collect();
        distinct.len()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

pub(crate) fn normalize(
    ast: FilterAst,
    limits: &CompileLimits,
) -> Result<NormalizedFilter, FilterError> {
    let raw = to_dnf(ast, false, limits)?;

    let mut minterms: Vec<Minterm> = raw.into_iter().map(Minterm::new).collect();
    minterms.sort_by(|a, b| a.key.cmp(&b.key));
    minterms.dedup_by(|a, b| a.key == b.key);
    check_minterm_limit(minterms.len(), limits)?;

    if limits.max_conditions > 0 {
        let distinct: FxHashSet<&str> = minterms
            .iter()
            .flat_map(|minterm| minterm.literals.iter().map(Literal::canonical_key))
            .collect();
        if distinct.len() > limits.max_conditions {
            return Err(FilterError::TooManyConditions {
                count: distinct.len(),
                limit: limits.max_conditions,
            });
        }
    }

    let key = minterms
        .iter()
        .map(Minterm::canonical_key)
        .collect::<Vec<_>>()
        .join("\u{1e}");
    Ok(NormalizedFilter { minterms, key })
}

/// Rewrites the tree into minterms, pushing `negated` down to the leaves.
fn to_dnf(
    ast: FilterAst,
    negated: bool,
    limits: &CompileLimits,
) -> Result<Vec<Vec<Literal>>, FilterError> {
    match ast {
        FilterAst::All => {
            if negated {
                return Err(FilterError::InvalidExpression(
                    "cannot negate an empty filter".to_string(),
                ));
            }
            Ok(vec![Vec::new()])
        }
        FilterAst::Leaf(Leaf { field, predicate }) => {
            Ok(vec![vec![Literal::new(field, predicate, negated)]])
        }
        FilterAst::Not(inner) => to_dnf(*inner, !negated, limits),
        FilterAst::And(children) => {
            if negated {
                dnf_union(children, true, limits)
            } else {
                dnf_product(children, false, limits)
            }
        }
        FilterAst::Or(children) => {
            if negated {
                dnf_product(children, true, limits)
            } else {
                dnf_union(children, false, limits)
            }
        }
    }
}

fn dnf_union(
    children: Vec<FilterAst>,
    negated: bool,
    limits: &CompileLimits,
) -> Result<Vec<Vec<Literal>>, FilterError> {
    let mut terms = Vec::new();
    for child in children {
        terms.extend(to_dnf(child, negated, limits)?);
    }
    check_minterm_limit(terms.len(), limits)?;
    Ok(terms)
}

fn dnf_product(
    children: Vec<FilterAst>,
    negated: bool,
    limits: &CompileLimits,
) -> Result<Vec<Vec<Literal>>, FilterError> {
    let mut acc: Vec<Vec<Literal>> = vec![Vec::new()];
    for child in children {
        let terms = to_dnf(child, negated, limits)?;
        check_minterm_limit(acc.len().saturating_mul(terms.len()), limits)?;
        let mut next = Vec::with_capacity(acc.len() * terms.len());
        for existing in &acc {
            for term in &terms {
                let mut combined = existing.clone();
                combined.extend(term.iter().cloned());
                next.push(combined);
            }
        }
        acc = next;
    }
    Ok(acc)
}

fn check_minterm_limit(count: usize, limits: &CompileLimits) -> Result<(), FilterError> {
    if limits.max_minterms > 0 && count > limits.max_minterms {
        return Err(FilterError::TooManyClauses { count, limit: limits.max_minterms });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
