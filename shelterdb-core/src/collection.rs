//! Collection types for document store operations.
//!
//! - [`Collection`] - Untyped collection with explicit BSON documents, used by the merger
//!   and the statistics aggregator which never need the record type.
//! - [`TypedCollection`] - Type-safe collection for a specific document type.
//!
//! Listing, counter and versioned-update operations are added to these types by the
//! [`page`](crate::page), [`counter`](crate::counter) and [`versioned`](crate::versioned)
//! modules.

use bson::{Bson, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::{FieldSummary, StoreBackend},
    document::{Document, DocumentExt},
    error::StoreResult,
    query::{Expr, Query, Update},
    store::StoreOptions,
};

/// An untyped collection with a reference to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    options: StoreOptions,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B, options: StoreOptions) -> Self {
        Self { name, backend, options }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Inserts new documents into the collection.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> StoreResult<()> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Retrieves documents from the collection by their IDs.
    ///
    /// Missing ids are omitted from the result.
    pub async fn get<U>(&self, ids: Vec<U>) -> StoreResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Queries documents in the collection, returning each with its id.
    pub async fn query(&self, query: Query) -> StoreResult<Vec<(Uuid, Bson)>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    pub async fn count(&self, filter: Option<Expr>) -> StoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    pub async fn group_count(&self, filter: Option<Expr>, field: &str) -> StoreResult<Vec<(Bson, u64)>> {
        self.backend
            .group_count(filter, field, self.name())
            .await
    }

    pub async fn summarize(&self, filter: Option<Expr>, field: &str) -> StoreResult<FieldSummary> {
        self.backend
            .summarize(filter, field, self.name())
            .await
    }
}

#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    options: StoreOptions,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B, options: StoreOptions) -> Self {
        Self { name, backend, options, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// The same collection without the document type.
    pub fn untyped(&self) -> Collection<'a, B> {
        Collection::new(self.name.clone(), self.backend, self.options)
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::error::StoreError::AlreadyExists) when an id is taken.
    pub async fn insert(&self, documents: Vec<D>) -> StoreResult<()> {
        self.backend
            .insert_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<StoreResult<Vec<(Uuid, Bson)>>>()?,
                self.name(),
            )
            .await
    }

    /// Replaces existing documents in the collection without any version check.
    pub async fn update(&self, documents: Vec<D>) -> StoreResult<()> {
        self.backend
            .update_documents(
                documents
                    .into_iter()
                    .map(|d| {
                        d.to_bson()
                            .map(move |b| (*d.id(), b))
                    })
                    .collect::<StoreResult<Vec<(Uuid, Bson)>>>()?,
                self.name(),
            )
            .await
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> StoreResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Retrieves documents from the collection by their IDs.
    pub async fn get<U>(&self, ids: Vec<U>) -> StoreResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect::<StoreResult<Vec<D>>>()
    }

    /// Retrieves one document, or `None` when it does not exist.
    pub async fn get_one(&self, id: Uuid) -> StoreResult<Option<D>> {
        Ok(self.get(vec![id]).await?.into_iter().next())
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> StoreResult<Vec<D>> {
        self.query_raw(query)
            .await?
            .into_iter()
            .map(|(_, doc)| D::from_bson(doc))
            .collect::<StoreResult<Vec<D>>>()
    }

    pub(crate) async fn query_raw(&self, query: Query) -> StoreResult<Vec<(Uuid, Bson)>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> StoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    /// Applies `update` to `id` if it still matches `precondition`. Returns the match count.
    pub(crate) async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
    ) -> StoreResult<u64> {
        self.backend
            .update_where(id, precondition, update, self.name())
            .await
    }
}
