//! Query construction and filtering API for document stores.
//!
//! This module provides the predicate AST ([`Expr`]) that every listing, count, merge and
//! aggregation call is expressed in, plus the [`Query`] envelope (sort keys, projection,
//! skip/limit) and the [`Update`] description used by conditional writes.
//!
//! # Query Building
//!
//! ```ignore
//! use shelterdb::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("status", "available"))
//!     .sort("intake_date", SortDirection::Desc)
//!     .limit(20)
//!     .offset(40)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides a collection of static methods for building filter expressions:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `contains` (case-insensitive substring)
//! - Existence: `exists`, `not_exists`
//! - Set membership: `any_of`
//! - Logical: `and`, `or`, `all`
//!
//! Field names may be dotted paths into embedded documents (`contact.email`).

use std::collections::HashMap;

use bson::Bson;

use crate::error::StoreError;

/// Name of the identifier field every backend sorts on as the final tie-break.
pub const ID_FIELD: &str = "id";

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Case-insensitive substring match on strings, element match on arrays.
    Contains,
    /// Field equals (or, for arrays, contains) any of the values.
    AnyOf,
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Returns a copy of this expression with field names translated through `mapping`.
    ///
    /// Names absent from the mapping are kept as-is. A dotted path whose leading segment
    /// is mapped has that segment replaced (`subject.name` -> `animal.name`).
    pub fn rename_fields(&self, mapping: &HashMap<String, String>) -> Expr {
        match self {
            Expr::And(exprs) => Expr::And(exprs.iter().map(|e| e.rename_fields(mapping)).collect()),
            Expr::Or(exprs) => Expr::Or(exprs.iter().map(|e| e.rename_fields(mapping)).collect()),
            Expr::Not(expr) => Expr::Not(Box::new(expr.rename_fields(mapping))),
            Expr::Exists(field, should_exist) => Expr::Exists(rename_path(field, mapping), *should_exist),
            Expr::Field { field, op, value } => Expr::Field {
                field: rename_path(field, mapping),
                op: *op,
                value: value.clone(),
            },
        }
    }
}

fn rename_path(field: &str, mapping: &HashMap<String, String>) -> String {
    if let Some(renamed) = mapping.get(field) {
        return renamed.clone();
    }

    match field.split_once('.') {
        Some((head, rest)) => match mapping.get(head) {
            Some(renamed) => format!("{renamed}.{rest}"),
            None => field.to_string(),
        },
        None => field.to_string(),
    }
}

/// A structured query for retrieving and filtering documents.
///
/// Sort keys apply in order; backends always append the document id ascending as a
/// final key so that equal sort values page deterministically.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Restricts returned documents to these fields when set.
    pub projection: Option<Vec<String>>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use shelterdb::query::Filter;
///
/// let expr = Filter::eq("species", "dog")
///     .and(Filter::gte("age_months", 12));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Case-insensitive substring match.
    ///
    /// The needle is matched literally; backends escape any pattern syntax.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Matches documents where the field exists (is present in the document).
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents whose field equals any of `values`.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// ANDs the given expressions, collapsing the trivial cases.
    ///
    /// Returns `None` (match everything) for an empty input and the expression itself
    /// for a single one.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        let mut exprs = exprs.into_iter().collect::<Vec<_>>();

        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }

    /// ANDs two optional predicates.
    pub fn both(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
        match (left, right) {
            (Some(left), Some(right)) => Some(left.and(right)),
            (left, None) => left,
            (None, right) => right,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the filter expression, or clears it with `None`.
    pub fn maybe_filter(mut self, filter: Option<Expr>) -> Self {
        self.query.filter = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key. Keys added earlier take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort::new(field, direction));
        self
    }

    /// Restricts the returned documents to the given fields.
    pub fn projection<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.query.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Field-level modifications applied atomically to a single document.
///
/// `set` assigns values, `inc` adds numeric deltas. Both may be dotted paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifications {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
}

impl Modifications {
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, delta: impl Into<Bson>) -> Self {
        self.inc.push((field.into(), delta.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty()
    }
}

/// A single-document write applied by [`StoreBackend::update_where`](crate::backend::StoreBackend::update_where).
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace the whole stored document.
    Replace(Bson),
    /// Apply `$set`/`$inc` style modifications in place.
    Modify(Modifications),
}

impl Update {
    pub fn replace(document: Bson) -> Self {
        Update::Replace(document)
    }

    /// Starts a modification with a `set` of one field.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Modifications {
        Modifications::default().set(field, value)
    }

    /// Starts a modification with an increment of one field.
    pub fn inc(field: impl Into<String>, delta: impl Into<Bson>) -> Modifications {
        Modifications::default().inc(field, delta)
    }
}

impl From<Modifications> for Update {
    fn from(modifications: Modifications) -> Self {
        Update::Modify(modifications)
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collapses_empty_and_single() {
        assert_eq!(Filter::all(vec![]), None);
        assert_eq!(Filter::all(vec![Filter::eq("a", 1)]), Some(Filter::eq("a", 1)));
        assert_eq!(
            Filter::all(vec![Filter::eq("a", 1), Filter::eq("b", 2)]),
            Some(Expr::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)])),
        );
    }

    #[test]
    fn rename_fields_translates_nested_paths() {
        let mapping = HashMap::from([
            ("date".to_string(), "visit_date".to_string()),
            ("subject".to_string(), "animal".to_string()),
        ]);

        let expr = Filter::gte("date", 1)
            .and(Filter::contains("subject.name", "rex"))
            .and(Filter::exists("notes"));

        assert_eq!(
            expr.rename_fields(&mapping),
            Expr::And(vec![
                Filter::gte("visit_date", 1),
                Filter::contains("animal.name", "rex"),
                Filter::exists("notes"),
            ]),
        );
    }

    #[test]
    fn builder_accumulates_sort_keys() {
        let query = Query::builder()
            .sort("date", SortDirection::Desc)
            .sort("kind", SortDirection::Asc)
            .projection(["date"])
            .build();

        assert_eq!(query.sort.len(), 2);
        assert_eq!(query.sort[0].field, "date");
        assert_eq!(query.projection, Some(vec!["date".to_string()]));
    }
}
