//! Query expression evaluation for in-memory document filtering.
//!
//! Matching follows the document store's rules closely enough that the same predicate selects
//! the same documents on either backend: equality against an array field matches any element,
//! a missing field compares equal to null, range operators only compare values of the same
//! kind, and `Contains` is a case-insensitive substring test.

use std::cmp::Ordering;

use bson::{Bson, datetime::DateTime};

use shelterdb_core::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::path::lookup;

/// Comparable representation of scalar BSON values.
///
/// Numeric types are normalized to f64; binary values (uuids) compare by their bytes.
#[derive(Debug, PartialEq)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Binary(&'a [u8]),
    /// Arrays, documents and the other BSON types, compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position in the cross-type sort order: null, numbers, strings, documents, arrays,
    /// binary, booleans, dates.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Other(Bson::Document(_)) => 3,
            Comparable::Other(Bson::Array(_)) => 4,
            Comparable::Binary(_) => 5,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
            Comparable::Other(_) => 9,
        }
    }

    /// Ordering within one kind of value, or `None` across kinds.
    fn compare_same_kind(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => Some(a.cmp(b)),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => Some(a.cmp(b)),
            (Comparable::String(a), Comparable::String(b)) => Some(a.cmp(b)),
            (Comparable::Binary(a), Comparable::Binary(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// A total order over every value, used for sorting.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.compare_same_kind(other).unwrap_or(Ordering::Equal))
    }
}

/// Compares two possibly missing field values for sorting; missing sorts with null.
pub(crate) fn sort_cmp(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.total_cmp(&right)
}

/// The candidate values a field contributes to a match: the value itself and, for arrays,
/// each element.
fn candidates(value: &Bson) -> Vec<&Bson> {
    match value {
        Bson::Array(items) => std::iter::once(value).chain(items.iter()).collect(),
        _ => vec![value],
    }
}

fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
    match field_value {
        None => Comparable::from(value) == Comparable::Null,
        Some(field_value) => candidates(field_value)
            .into_iter()
            .any(|candidate| Comparable::from(candidate) == Comparable::from(value)),
    }
}

fn contains_ignoring_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Whether `document` matches `filter`; everything matches an absent filter.
    pub fn matches(document: &'a Bson, filter: Option<&Expr>) -> StoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = lookup(self.document, field);

        match op {
            FieldOp::Eq => Ok(equals(field_value, value)),
            FieldOp::Ne => Ok(!equals(field_value, value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                let Some(field_value) = field_value else {
                    return Ok(false);
                };
                let bound = Comparable::from(value);

                Ok(candidates(field_value).into_iter().any(|candidate| {
                    match Comparable::from(candidate).compare_same_kind(&bound) {
                        Some(ordering) => match op {
                            FieldOp::Gt => ordering == Ordering::Greater,
                            FieldOp::Gte => ordering != Ordering::Less,
                            FieldOp::Lt => ordering == Ordering::Less,
                            _ => ordering != Ordering::Greater,
                        },
                        None => false,
                    }
                }))
            }
            FieldOp::Contains => {
                let Bson::String(needle) = value else {
                    return Err(StoreError::InvalidDocument(format!(
                        "contains on {field} needs a string, got {:?}",
                        value.element_type()
                    )));
                };

                Ok(field_value.is_some_and(|field_value| {
                    candidates(field_value).into_iter().any(|candidate| match candidate {
                        Bson::String(haystack) => contains_ignoring_case(haystack, needle),
                        _ => false,
                    })
                }))
            }
            FieldOp::AnyOf => match value {
                Bson::Array(values) => Ok(values.iter().any(|value| equals(field_value, value))),
                single => Ok(equals(field_value, single)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::{Uuid, bson};
    use shelterdb_core::query::Filter;

    use super::*;

    fn matches(document: &Bson, expr: Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn contains_ignores_case_and_treats_needle_literally() {
        let animal = bson!({ "name": "Sir Barks-a-Lot", "tags": ["Friendly", "house trained"] });

        assert!(matches(&animal, Filter::contains("name", "barks")));
        assert!(matches(&animal, Filter::contains("tags", "TRAINED")));
        assert!(!matches(&animal, Filter::contains("name", "b.rks")));
    }

    #[test]
    fn missing_fields_equal_null_and_fail_ranges() {
        let document = bson!({ "status": "available" });

        assert!(matches(&document, Filter::eq("adopted_at", Bson::Null)));
        assert!(matches(&document, Filter::ne("species", "dog")));
        assert!(!matches(&document, Filter::gte("age", 1)));
    }

    #[test]
    fn ranges_compare_within_one_kind() {
        let document = bson!({ "age": 24, "name": "Rex" });

        assert!(matches(&document, Filter::gte("age", 24_i64)));
        assert!(matches(&document, Filter::lt("age", 24.5)));
        assert!(!matches(&document, Filter::gt("name", 1)));
    }

    #[test]
    fn uuids_match_by_value() {
        let id = Uuid::new();
        let document = bson!({ "animal_id": id });

        assert!(matches(&document, Filter::eq("animal_id", id)));
        assert!(matches(&document, Filter::any_of("animal_id", [Uuid::new(), id])));
        assert!(!matches(&document, Filter::eq("animal_id", Uuid::new())));
    }

    #[test]
    fn dotted_paths_reach_embedded_documents() {
        let donor = bson!({ "contact": { "email": "Ada@Example.org" } });
        assert!(matches(&donor, Filter::contains("contact.email", "example")));
    }

    #[test]
    fn sort_order_places_missing_first() {
        assert_eq!(sort_cmp(None, Some(&Bson::Int32(1))), Ordering::Less);
        assert_eq!(sort_cmp(Some(&Bson::Int32(2)), Some(&Bson::Double(1.5))), Ordering::Greater);
        assert_eq!(sort_cmp(Some(&Bson::Int32(2)), Some(&Bson::String("a".into()))), Ordering::Less);
    }
}
