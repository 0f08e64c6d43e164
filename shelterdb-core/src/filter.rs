//! Typed filters and their compilation into store predicates.
//!
//! Each entity declares a filter struct with a closed set of fields and implements
//! [`FilterSpec`] for it. Compilation emits one constraint per specified field and ANDs them;
//! blank values (empty strings, zero numbers, empty lists) count as "not specified". The
//! free-text `search` value expands to an OR of case-insensitive substring matches over the
//! entity's fixed [`FilterSpec::SEARCH_FIELDS`].
//!
//! Filters arriving through the loosely typed [`ListRequest`] are parsed leniently: a value
//! that does not parse (a misspelled status, a malformed date) is dropped with a warning and
//! the field is treated as unspecified.

use std::collections::HashMap;

use bson::Bson;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{
    document::bson_datetime,
    page::{PageRequest, SortOrder},
    query::{Expr, Filter},
};

/// One constraint on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Field equals the value.
    Eq(Bson),
    /// Field lies within the inclusive bounds; either bound may be absent.
    Range { min: Option<Bson>, max: Option<Bson> },
    /// Field equals one of the values.
    In(Vec<Bson>),
    /// Field contains the needle, ignoring case.
    Contains(String),
    /// Field is present (`true`) or missing (`false`).
    Exists(bool),
}

impl Predicate {
    /// Compiles this predicate against `field`, or `None` when it constrains nothing.
    pub fn compile(&self, field: &str) -> Option<Expr> {
        match self {
            Predicate::Eq(value) => Some(Filter::eq(field, value.clone())),
            Predicate::Range { min, max } => Filter::all(
                min.iter()
                    .map(|min| Filter::gte(field, min.clone()))
                    .chain(max.iter().map(|max| Filter::lte(field, max.clone()))),
            ),
            Predicate::In(values) if values.is_empty() => None,
            Predicate::In(values) => Some(Filter::any_of(field, values.iter().cloned())),
            Predicate::Contains(needle) => Some(Filter::contains(field, needle.as_str())),
            Predicate::Exists(true) => Some(Filter::exists(field)),
            Predicate::Exists(false) => Some(Filter::not_exists(field)),
        }
    }
}

/// Whether a value counts as "not specified".
pub fn is_blank(value: &Bson) -> bool {
    match value {
        Bson::Null => true,
        Bson::String(s) => s.trim().is_empty(),
        Bson::Int32(n) => *n == 0,
        Bson::Int64(n) => *n == 0,
        Bson::Double(n) => *n == 0.0,
        Bson::Array(values) => values.is_empty(),
        _ => false,
    }
}

fn to_bson<V: Serialize>(field: &str, value: &V) -> Option<Bson> {
    match bson::serialize_to_bson(value) {
        Ok(bson) if !is_blank(&bson) => Some(bson),
        Ok(_) => None,
        Err(error) => {
            warn!(field, %error, "dropping filter value that does not serialize");
            None
        }
    }
}

/// Accumulates the specified predicates of a filter, skipping blank values.
#[derive(Debug, Clone, Default)]
pub struct Predicates {
    entries: Vec<(String, Predicate)>,
}

impl Predicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on `field` when `value` is present and not blank.
    pub fn eq<V: Serialize>(mut self, field: &str, value: Option<&V>) -> Self {
        if let Some(value) = value.and_then(|v| to_bson(field, v)) {
            self.entries.push((field.to_string(), Predicate::Eq(value)));
        }
        self
    }

    /// Equality on a boolean flag; `false` is a real value here, only `None` is unspecified.
    pub fn flag(mut self, field: &str, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.entries.push((field.to_string(), Predicate::Eq(Bson::Boolean(value))));
        }
        self
    }

    /// Inclusive range; omitted entirely when both bounds are unspecified.
    pub fn range<V: Serialize>(mut self, field: &str, min: Option<&V>, max: Option<&V>) -> Self {
        let min = min.and_then(|v| to_bson(field, v));
        let max = max.and_then(|v| to_bson(field, v));

        if min.is_some() || max.is_some() {
            self.entries.push((field.to_string(), Predicate::Range { min, max }));
        }
        self
    }

    /// Date range over a document datetime field.
    pub fn date_range(mut self, field: &str, from: Option<bson::DateTime>, to: Option<bson::DateTime>) -> Self {
        if from.is_some() || to.is_some() {
            self.entries.push((
                field.to_string(),
                Predicate::Range { min: from.map(Bson::DateTime), max: to.map(Bson::DateTime) },
            ));
        }
        self
    }

    /// Set membership; omitted when `values` is empty.
    pub fn any_of<V: Serialize>(mut self, field: &str, values: &[V]) -> Self {
        let values = values
            .iter()
            .filter_map(|v| to_bson(field, v))
            .collect::<Vec<_>>();

        if !values.is_empty() {
            self.entries.push((field.to_string(), Predicate::In(values)));
        }
        self
    }

    /// Case-insensitive substring match; omitted when the needle is blank.
    pub fn contains(mut self, field: &str, needle: Option<&str>) -> Self {
        if let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) {
            self.entries.push((field.to_string(), Predicate::Contains(needle.to_string())));
        }
        self
    }

    pub fn exists(mut self, field: &str, should_exist: Option<bool>) -> Self {
        if let Some(should_exist) = should_exist {
            self.entries.push((field.to_string(), Predicate::Exists(should_exist)));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, Predicate)> {
        self.entries
    }
}

/// A per-entity typed filter.
pub trait FilterSpec: Default + Send + Sync {
    /// Text fields the free-text search runs over.
    const SEARCH_FIELDS: &'static [&'static str];

    /// The specified, non-blank field predicates of this filter.
    fn predicates(&self) -> Predicates;

    /// The free-text search term, if any.
    fn search(&self) -> Option<&str> {
        None
    }

    /// Builds the filter from loosely typed request fields.
    fn from_fields(fields: &FilterFields) -> Self;

    /// Compiles this filter into a predicate; `None` matches every document.
    fn compile(&self) -> Option<Expr> {
        let mut exprs = self
            .predicates()
            .into_entries()
            .into_iter()
            .filter_map(|(field, predicate)| predicate.compile(&field))
            .collect::<Vec<_>>();

        if let Some(term) = self.search().map(str::trim).filter(|t| !t.is_empty()) {
            if !Self::SEARCH_FIELDS.is_empty() {
                exprs.push(Filter::or(
                    Self::SEARCH_FIELDS
                        .iter()
                        .map(|field| Filter::contains(*field, term)),
                ));
            }
        }

        Filter::all(exprs)
    }
}

/// A request field value: a single string or a list of strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    One(String),
    Many(Vec<String>),
}

/// The loosely typed filter fields of a [`ListRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FilterFields(HashMap<String, FieldValue>);

impl FilterFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), FieldValue::One(value.into()));
        self
    }

    pub fn with_many<S: Into<String>>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        self.0.insert(name.into(), FieldValue::Many(values.into_iter().map(Into::into).collect()));
        self
    }

    /// The first non-blank value of a field.
    pub fn text(&self, name: &str) -> Option<String> {
        let value = match self.0.get(name)? {
            FieldValue::One(value) => Some(value.trim().to_string()),
            FieldValue::Many(values) => values.iter().map(|v| v.trim()).find(|v| !v.is_empty()).map(str::to_string),
        };

        value.filter(|value| !value.is_empty())
    }

    /// All non-blank values of a field; a single value may also be comma separated.
    pub fn list(&self, name: &str) -> Vec<String> {
        let values = match self.0.get(name) {
            Some(FieldValue::One(value)) => value.split(',').map(str::to_string).collect(),
            Some(FieldValue::Many(values)) => values.clone(),
            None => Vec::new(),
        };

        values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Parses a field into a serde type (enums use their serialized names).
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let text = self.text(name)?;
        parse_value(name, &text)
    }

    /// Parses every value of a list field, dropping the ones that do not parse.
    pub fn parse_list<T: DeserializeOwned>(&self, name: &str) -> Vec<T> {
        self.list(name)
            .iter()
            .filter_map(|text| parse_value(name, text))
            .collect()
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        let text = self.text(name)?;
        match text.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => {
                warn!(field = name, value = %text, "dropping malformed boolean filter");
                None
            }
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        let text = self.text(name)?;
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                warn!(field = name, value = %text, "dropping malformed numeric filter");
                None
            }
        }
    }

    /// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC).
    pub fn datetime(&self, name: &str) -> Option<bson::DateTime> {
        let text = self.text(name)?;
        match parse_datetime(&text) {
            Some(at) => Some(bson_datetime(at)),
            None => {
                warn!(field = name, value = %text, "dropping malformed date filter");
                None
            }
        }
    }
}

fn parse_value<T: DeserializeOwned>(name: &str, text: &str) -> Option<T> {
    match serde_json::from_value::<T>(serde_json::Value::String(text.to_string())) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(field = name, value = %text, %error, "dropping unrecognized filter value");
            None
        }
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Inbound listing request as bound by the HTTP layer.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ListRequest {
    pub filter_fields: FilterFields,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListRequest {
    /// Splits the request into a typed filter and its page parameters.
    pub fn into_parts<F: FilterSpec>(self) -> (F, PageRequest) {
        let filter = F::from_fields(&self.filter_fields);
        let page = self.page();

        (filter, page)
    }

    pub fn page(&self) -> PageRequest {
        let sort_order = match self.sort_order.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => SortOrder::parse(text).unwrap_or_else(|| {
                warn!(value = text, "unrecognized sort order, using default");
                SortOrder::default()
            }),
            None => SortOrder::default(),
        };

        PageRequest {
            limit: self.limit,
            offset: self.offset,
            sort_by: self.sort_by.clone().filter(|s| !s.trim().is_empty()),
            sort_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum Kind {
        Dog,
        Cat,
    }

    #[derive(Default)]
    struct PetFilter {
        kind: Option<Kind>,
        name: Option<String>,
        min_age: Option<i32>,
        max_age: Option<i32>,
        friendly: Option<bool>,
        search: Option<String>,
    }

    impl FilterSpec for PetFilter {
        const SEARCH_FIELDS: &'static [&'static str] = &["name", "notes"];

        fn predicates(&self) -> Predicates {
            Predicates::new()
                .eq("kind", self.kind.as_ref())
                .eq("name", self.name.as_ref())
                .range("age", self.min_age.as_ref(), self.max_age.as_ref())
                .flag("friendly", self.friendly)
        }

        fn search(&self) -> Option<&str> {
            self.search.as_deref()
        }

        fn from_fields(fields: &FilterFields) -> Self {
            Self {
                kind: fields.parse("kind"),
                name: fields.text("name"),
                min_age: fields.number("min_age").map(|n| n as i32),
                max_age: fields.number("max_age").map(|n| n as i32),
                friendly: fields.flag("friendly"),
                search: fields.text("search"),
            }
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert_eq!(PetFilter::default().compile(), None);

        let blank = PetFilter {
            name: Some("   ".into()),
            min_age: Some(0),
            search: Some("".into()),
            ..PetFilter::default()
        };
        assert_eq!(blank.compile(), None);
    }

    #[test]
    fn single_sided_range_emits_one_bound() {
        let filter = PetFilter { max_age: Some(24), ..PetFilter::default() };
        assert_eq!(filter.compile(), Some(Filter::lte("age", 24)));
    }

    #[test]
    fn false_flag_is_a_real_constraint() {
        let filter = PetFilter { friendly: Some(false), ..PetFilter::default() };
        assert_eq!(filter.compile(), Some(Filter::eq("friendly", false)));
    }

    #[test]
    fn search_expands_over_fixed_fields() {
        let filter = PetFilter {
            kind: Some(Kind::Dog),
            search: Some("rex".into()),
            ..PetFilter::default()
        };

        assert_eq!(
            filter.compile(),
            Some(Expr::And(vec![
                Filter::eq("kind", "dog"),
                Filter::or([Filter::contains("name", "rex"), Filter::contains("notes", "rex")]),
            ])),
        );
    }

    #[test]
    fn malformed_request_values_are_dropped() {
        let fields = FilterFields::new()
            .with("kind", "dragon")
            .with("friendly", "maybe")
            .with("min_age", "twelve")
            .with("name", "Rex");

        let filter = PetFilter::from_fields(&fields);

        assert_eq!(filter.kind, None);
        assert_eq!(filter.friendly, None);
        assert_eq!(filter.min_age, None);
        assert_eq!(filter.compile(), Some(Filter::eq("name", "Rex")));
    }

    #[test]
    fn list_fields_accept_arrays_and_commas() {
        let fields = FilterFields::new()
            .with("status", "dog, cat,,")
            .with_many("other", ["dog", " ", "cat"]);

        assert_eq!(fields.parse_list::<Kind>("status"), vec![Kind::Dog, Kind::Cat]);
        assert_eq!(fields.parse_list::<Kind>("other"), vec![Kind::Dog, Kind::Cat]);
    }

    #[test]
    fn dates_parse_in_both_formats() {
        assert!(parse_datetime("2026-10-19").is_some());
        assert!(parse_datetime("2026-10-19T12:30:00Z").is_some());
        assert!(parse_datetime("19/10/2026").is_none());
    }

    #[test]
    fn request_deserializes_with_mixed_field_shapes() {
        let request: ListRequest = serde_json::from_value(serde_json::json!({
            "filter_fields": { "kind": "dog", "tags": ["a", "b"] },
            "limit": 10,
            "sort_order": "ASC"
        }))
        .unwrap();

        let (filter, page): (PetFilter, PageRequest) = request.into_parts();

        assert_eq!(filter.kind, Some(Kind::Dog));
        assert_eq!(page.limit, 10);
        assert_eq!(page.sort_order, SortOrder::Asc);
    }
}
