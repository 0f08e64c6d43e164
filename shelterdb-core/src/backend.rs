//! Storage backend abstraction for the document store.
//!
//! This module defines the core traits that abstract over different storage implementations,
//! allowing the query and aggregation layer to run unchanged against the in-memory store in
//! tests and MongoDB in production.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait is the whole contract the layer above relies on: point reads,
//! filtered and sorted scans with projection, counts, grouped counts, numeric summaries, and
//! a single-document conditional update that is atomic with respect to every other write.
//! Implementations are required to be thread-safe (`Send + Sync`).
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::{Bson, Uuid};
use serde::Serialize;
use std::{any::Any, fmt::Debug};

use crate::{
    error::StoreResult,
    query::{Expr, Query, Update},
};

/// Numeric summary of one field over the documents matching a filter.
///
/// Only documents where the field holds a number take part; `count` says how many did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldSummary {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldSummary {
    /// Folds one numeric value into the summary.
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }

    /// Arithmetic mean, or zero when nothing was summed.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. [`update_where`](StoreBackend::update_where) must evaluate its precondition
/// and apply its modification as one indivisible step: two racing calls with the same
/// precondition can never both match.
///
/// # Cancellation
///
/// Dropping any returned future abandons the call. A conditional update that is dropped
/// has either been applied entirely or not at all.
///
/// # Error Handling
///
/// Failures of the underlying store surface as [`StoreError::Unavailable`](crate::error::StoreError::Unavailable)
/// and are never retried at this layer.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// The collection is created on first insert. Inserting an id that already exists
    /// fails with [`StoreError::AlreadyExists`](crate::error::StoreError::AlreadyExists).
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()>;

    /// Replaces existing documents in a collection.
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()>;

    /// Deletes documents from a collection by their IDs.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()>;

    /// Retrieves documents from a collection by their IDs.
    ///
    /// Missing ids are omitted. Result order is unspecified.
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> StoreResult<Vec<Bson>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// Results are ordered by the query's sort keys followed by the document id ascending,
    /// then skipped and limited. When the query carries a projection only those fields are
    /// returned; the id is always returned alongside each document.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> StoreResult<Vec<(Uuid, Bson)>>;

    /// Counts the documents matching `filter` (all documents when `None`).
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64>;

    /// Atomically applies `update` to the document `id` if it also matches `precondition`.
    ///
    /// Returns the number of documents matched, which is 0 or 1. A missing document and a
    /// failed precondition both yield 0; callers distinguish them with a follow-up read.
    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64>;

    /// Counts matching documents grouped by the value of `field`.
    ///
    /// Documents where the field is missing are grouped under [`Bson::Null`].
    async fn group_count(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<Vec<(Bson, u64)>>;

    /// Sums, and takes the extremes of, a numeric field over the matching documents.
    async fn summarize(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<FieldSummary>;

    /// Creates a new empty collection.
    async fn create_collection(&self, name: &str) -> StoreResult<()>;

    /// Drops a collection and all of its documents.
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// Creates an ascending index on a field, optionally enforcing uniqueness.
    async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> StoreResult<()>;

    /// Removes an index from a collection.
    async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()>;
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()>;
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()>;
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> StoreResult<Vec<Bson>>;
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> StoreResult<Vec<(Uuid, Bson)>>;
    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64>;
    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64>;
    async fn group_count(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<Vec<(Bson, u64)>>;
    async fn summarize(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<FieldSummary>;
    async fn create_collection(&self, name: &str) -> StoreResult<()>;
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;
    async fn list_collections(&self) -> StoreResult<Vec<String>>;
    async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> StoreResult<()>;
    async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> StoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()> {
        StoreBackend::update_documents(self, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> StoreResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> StoreResult<Vec<(Uuid, Bson)>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64> {
        StoreBackend::update_where(self, id, precondition, update, collection).await
    }

    async fn group_count(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<Vec<(Bson, u64)>> {
        StoreBackend::group_count(self, filter, field, collection).await
    }

    async fn summarize(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<FieldSummary> {
        StoreBackend::summarize(self, filter, field, collection).await
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> StoreResult<()> {
        StoreBackend::add_index(self, collection, field, unique).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        StoreBackend::drop_index(self, collection, field).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> StoreResult<()> {
        StoreBackend::shutdown(*self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Lets a boxed backend chosen at runtime stand in wherever a [`StoreBackend`] is expected.
#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()> {
        (**self).insert_documents(documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> StoreResult<()> {
        (**self).update_documents(documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()> {
        (**self).delete_documents(ids, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> StoreResult<Vec<Bson>> {
        (**self).get_documents(ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> StoreResult<Vec<(Uuid, Bson)>> {
        (**self).query_documents(query, collection).await
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64> {
        (**self).count_documents(filter, collection).await
    }

    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64> {
        (**self).update_where(id, precondition, update, collection).await
    }

    async fn group_count(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<Vec<(Bson, u64)>> {
        (**self).group_count(filter, field, collection).await
    }

    async fn summarize(
        &self,
        filter: Option<Expr>,
        field: &str,
        collection: &str,
    ) -> StoreResult<FieldSummary> {
        (**self).summarize(filter, field, collection).await
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        (**self).create_collection(name).await
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        (**self).drop_collection(name).await
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> StoreResult<()> {
        (**self).add_index(collection, field, unique).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        (**self).drop_index(collection, field).await
    }

    async fn shutdown(self) -> StoreResult<()> {
        DynStoreBackend::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> StoreResult<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tracks_extremes_and_average() {
        let mut summary = FieldSummary::default();
        assert_eq!(summary.average(), 0.0);

        for value in [25.0, 100.0, 10.0] {
            summary.add(value);
        }

        assert_eq!(summary.count, 3);
        assert_eq!(summary.sum, 135.0);
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(100.0));
        assert_eq!(summary.average(), 45.0);
    }
}
