//! Main document store interface for interacting with document backends.
//!
//! A [`DocumentStore`] owns one backend plus the [`StoreOptions`] every operation runs under
//! (page sizes, the first day of the statistics week, an optional per-operation deadline).
//! When the backend is only known at runtime use [`DynDocumentStore`].
//!
//! # Example
//!
//! ```ignore
//! use shelterdb::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let animals = store.typed_collection::<Animal>();
//! ```

use std::{future::Future, time::Duration};

use chrono::Weekday;
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, TypedCollection},
    deadline::with_optional_deadline,
    document::Document,
    error::StoreResult,
    page::PagePolicy,
};

/// Settings applied to every operation issued through a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub paging: PagePolicy,
    /// First day of the `this_week` statistics window.
    pub week_start: Weekday,
    /// Upper bound on any single listing, merge, aggregation or update call.
    pub deadline: Option<Duration>,
}

impl StoreOptions {
    /// Runs `operation` under the configured deadline, if any.
    pub async fn bounded<T, F>(&self, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        with_optional_deadline(self.deadline, operation).await
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            paging: PagePolicy::default(),
            week_start: Weekday::Sun,
            deadline: None,
        }
    }
}

/// A single-field index a document type expects its collection to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: &'static str,
    pub unique: bool,
}

impl IndexSpec {
    pub const fn new(field: &'static str) -> Self {
        Self { field, unique: false }
    }

    pub const fn unique(field: &'static str) -> Self {
        Self { field, unique: true }
    }
}

/// A document type with a fixed set of indexes.
pub trait Indexed: Document {
    const INDEXES: &'static [IndexSpec];
}

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    options: StoreOptions,
}

/// A document store over a backend chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend and default options.
    pub fn new(backend: B) -> Self {
        Self { backend, options: StoreOptions::default() }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend, self.options)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend, self.options)
    }

    pub async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.backend.create_collection(name).await
    }

    /// Drops a collection and every document in it.
    pub async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Adds an index to a field in a collection.
    pub async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> StoreResult<()> {
        self.backend
            .add_index(collection, field, unique)
            .await
    }

    pub async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        self.backend
            .drop_index(collection, field)
            .await
    }

    /// Creates the collection of `D` and every index it declares. Safe to repeat.
    pub async fn ensure_indexes<D: Indexed>(&self) -> StoreResult<()> {
        let collection = D::collection_name();
        self.create_collection(collection).await?;

        for index in D::INDEXES {
            self.add_index(collection, index.field, index.unique).await?;
        }

        debug!(collection, indexes = D::INDEXES.len(), "indexes ensured");
        Ok(())
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.backend.shutdown().await
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Erases the backend type, keeping the options.
    pub fn into_dyn(self) -> DynDocumentStore {
        DocumentStore {
            backend: Box::new(self.backend),
            options: self.options,
        }
    }
}
