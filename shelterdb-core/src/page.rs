//! Pagination request/result types and the page executor.
//!
//! Every listing goes through [`TypedCollection::list`]: count the compiled predicate,
//! resolve the sort key against the entity's closed set of sortable fields, then fetch one
//! window ordered by that key with the document id as the final tie-break.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::{Document, DocumentExt},
    error::StoreResult,
    filter::FilterSpec,
    query::{Expr, ID_FIELD, Query, SortDirection},
};

/// Sort order of a listing. Defaults to descending.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parses `asc`/`desc` case-insensitively; anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl From<SortOrder> for SortDirection {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => SortDirection::Asc,
            SortOrder::Desc => SortDirection::Desc,
        }
    }
}

/// Default and ceiling page sizes applied to every listing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PagePolicy {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl PagePolicy {
    /// Resolves a requested limit: 0 means the default, and nothing exceeds the maximum.
    pub fn effective_limit(&self, requested: usize) -> usize {
        let limit = if requested == 0 { self.default_limit } else { requested };
        limit.clamp(1, self.max_limit.max(1))
    }
}

impl Default for PagePolicy {
    fn default() -> Self {
        Self { default_limit: 20, max_limit: 100 }
    }
}

/// One page worth of listing parameters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PageRequest {
    /// Page size; 0 selects the policy default.
    pub limit: usize,
    pub offset: usize,
    /// Sort field; unknown or absent names fall back to the entity default.
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset, ..Self::default() }
    }

    pub fn builder() -> PageRequestBuilder {
        PageRequestBuilder::default()
    }

    /// Resolves the sort field against a closed set, falling back to `default`.
    pub fn sort_field<'a>(&'a self, sortable: &[&str], default: &'a str) -> &'a str {
        match self.sort_by.as_deref() {
            Some(field) if sortable.contains(&field) => field,
            Some(field) => {
                debug!(field, fallback = default, "ignoring unsortable field");
                default
            }
            None => default,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageRequestBuilder {
    request: PageRequest,
}

impl PageRequestBuilder {
    pub fn limit(mut self, limit: usize) -> Self {
        self.request.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.request.offset = offset;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.request.sort_by = Some(field.into());
        self
    }

    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.request.sort_order = order;
        self
    }

    pub fn build(self) -> PageRequest {
        self.request
    }
}

/// A single page of results plus the total number of matches.
///
/// `limit` is the effective page size that was applied, not the raw request value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

impl<T> PageResult<T> {
    pub fn builder(data: Vec<T>) -> PageResultBuilder<T> {
        PageResultBuilder::new(data)
    }

    /// Whether rows exist beyond this page.
    pub fn has_more(&self) -> bool {
        ((self.offset + self.data.len()) as u64) < self.total
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Like [`PageResult::map`], failing on the first row that does not convert.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PageResult<U>, E> {
        Ok(PageResult {
            data: self.data.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

impl<T> Default for PageResult<T> {
    fn default() -> Self {
        Self { data: Vec::new(), total: 0, limit: 0, offset: 0 }
    }
}

/// Builder for constructing [`PageResult`] instances with fluent API.
pub struct PageResultBuilder<T> {
    data: Vec<T>,
    total: u64,
    limit: usize,
    offset: usize,
}

impl<T> PageResultBuilder<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data, total: 0, limit: 0, offset: 0 }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> PageResult<T> {
        PageResult {
            data: self.data,
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// A document type that can be listed page by page.
pub trait Listing: Document {
    /// The typed filter accepted by this entity's listing.
    type Filter: FilterSpec;

    /// Sort field used when the request names none, or names one outside [`Self::SORTABLE_FIELDS`].
    const DEFAULT_SORT_FIELD: &'static str;

    /// Fields a caller may sort by.
    const SORTABLE_FIELDS: &'static [&'static str];
}

impl<'a, B: StoreBackend, D: Listing> TypedCollection<'a, B, D> {
    /// Lists documents matching a typed filter.
    pub async fn list(&self, filter: &D::Filter, page: &PageRequest) -> StoreResult<PageResult<D>> {
        self.list_where(filter.compile(), page).await
    }

    /// Lists documents matching an already compiled predicate.
    pub async fn list_where(&self, predicate: Option<Expr>, page: &PageRequest) -> StoreResult<PageResult<D>> {
        let options = self.options();
        options
            .bounded(async {
                let limit = options.paging.effective_limit(page.limit);
                let sort_field = page.sort_field(D::SORTABLE_FIELDS, D::DEFAULT_SORT_FIELD);

                debug!(
                    collection = self.name(),
                    limit,
                    offset = page.offset,
                    sort_field,
                    sort_order = ?page.sort_order,
                    "listing page"
                );

                let total = self.count(predicate.clone()).await?;

                if page.offset as u64 >= total {
                    return Ok(PageResult::builder(Vec::new())
                        .with_total(total)
                        .with_limit(limit)
                        .with_offset(page.offset)
                        .build());
                }

                let mut query = Query::builder()
                    .maybe_filter(predicate)
                    .sort(sort_field, page.sort_order.into())
                    .offset(page.offset)
                    .limit(limit);
                if sort_field != ID_FIELD {
                    query = query.sort(ID_FIELD, SortDirection::Asc);
                }

                let data = self
                    .query_raw(query.build())
                    .await?
                    .into_iter()
                    .map(|(_, document)| D::from_bson(document))
                    .collect::<StoreResult<Vec<D>>>()?;

                Ok(PageResult::builder(data)
                    .with_total(total)
                    .with_limit(limit)
                    .with_offset(page.offset)
                    .build())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_uses_default_and_large_limits_are_capped() {
        let policy = PagePolicy::default();

        assert_eq!(policy.effective_limit(0), 20);
        assert_eq!(policy.effective_limit(5), 5);
        assert_eq!(policy.effective_limit(10_000), 100);
    }

    #[test]
    fn unsortable_field_falls_back_to_default() {
        let page = PageRequest::builder().sort_by("password").build();
        assert_eq!(page.sort_field(&["name", "created_at"], "created_at"), "created_at");

        let page = PageRequest::builder().sort_by("name").build();
        assert_eq!(page.sort_field(&["name", "created_at"], "created_at"), "name");
    }

    #[test]
    fn sort_order_defaults_to_desc() {
        assert_eq!(PageRequest::default().sort_order, SortOrder::Desc);
        assert_eq!(SortOrder::parse(" ASC "), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse("sideways"), None);
    }

    #[test]
    fn has_more_reflects_remaining_rows() {
        let page = PageResult::builder(vec![1, 2]).with_total(5).with_limit(2).with_offset(2).build();
        assert!(page.has_more());

        let page = PageResult::builder(vec![5]).with_total(5).with_limit(2).with_offset(4).build();
        assert!(!page.has_more());
    }
}
