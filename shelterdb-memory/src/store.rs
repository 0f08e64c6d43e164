//! In-memory storage implementation for document stores.
//!
//! This module provides a simple backend that stores documents as BSON values in HashMaps
//! behind one async-aware read-write lock. Every write, including a conditional update's
//! precondition check, happens under the write guard, which is what makes compare-and-swap
//! and increments atomic here.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Uuid};
use mea::rwlock::RwLock;
use tracing::trace;

use shelterdb_core::{
    backend::{FieldSummary, StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    query::{Expr, Query, SortDirection, Update},
};

use crate::{
    evaluator::{DocumentEvaluator, sort_cmp},
    path::{as_f64, increment_path, lookup, project, set_path},
};

type CollectionMap = HashMap<Uuid, Bson>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// safely shared across async tasks. Multiple clones of the same instance share the same
/// underlying data.
///
/// Queries scan every document of a collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use shelterdb_memory::InMemoryStore;
/// use shelterdb_core::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let id = Uuid::new();
/// let animal = Bson::Document(doc! { "id": id, "name": "Rex", "species": "dog" });
/// store.insert_documents(vec![(id, animal)], "animals").await?;
///
/// assert_eq!(store.count_documents(None, "animals").await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

/// Documents of `collection_map` matching `filter`, paired with their ids.
fn matching<'m>(
    collection_map: &'m CollectionMap,
    filter: Option<&Expr>,
) -> StoreResult<Vec<(&'m Uuid, &'m Bson)>> {
    let mut matched = Vec::new();

    for (id, document) in collection_map {
        if DocumentEvaluator::matches(document, filter)? {
            matched.push((id, document));
        }
    }

    Ok(matched)
}

fn apply_update(document: &mut Bson, update: Update) -> StoreResult<()> {
    match update {
        Update::Replace(replacement) => {
            *document = replacement;
        }
        Update::Modify(modifications) => {
            let Some(fields) = document.as_document_mut() else {
                return Err(StoreError::InvalidDocument("stored value is not a document".to_string()));
            };

            for (path, value) in modifications.set {
                set_path(fields, &path, value)?;
            }
            for (path, delta) in &modifications.inc {
                increment_path(fields, path, delta)?;
            }
        }
    }

    Ok(())
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if let Some((id, _)) = documents.iter().find(|(id, _)| collection_map.contains_key(id)) {
            return Err(StoreError::AlreadyExists { id: id.to_string(), collection: collection.to_string() });
        }

        collection_map.extend(documents);

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return match documents.first() {
                Some((id, _)) => Err(StoreError::not_found(id, collection)),
                None => Ok(()),
            };
        };

        for (id, doc) in documents {
            match collection_map.get_mut(&id) {
                Some(stored) => *stored = doc,
                None => return Err(StoreError::not_found(id, collection)),
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()> {
        let mut store = self.store.write().await;
        let Some(collection_map) = store.get_mut(collection) else {
            return match ids.first() {
                Some(id) => Err(StoreError::not_found(id, collection)),
                None => Ok(()),
            };
        };

        for id in ids {
            if collection_map.remove(&id).is_none() {
                return Err(StoreError::not_found(id, collection));
            }
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| collection_map.get(id))
            .cloned()
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> StoreResult<Vec<(Uuid, Bson)>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = matching(collection_map, query.filter.as_ref())?;

        documents.sort_by(|(left_id, left), (right_id, right)| {
            query
                .sort
                .iter()
                .fold(Ordering::Equal, |ordering, sort| {
                    ordering.then_with(|| {
                        let by_field = sort_cmp(lookup(left, &sort.field), lookup(right, &sort.field));
                        match sort.direction {
                            SortDirection::Asc => by_field,
                            SortDirection::Desc => by_field.reverse(),
                        }
                    })
                })
                .then_with(|| left_id.bytes().cmp(&right_id.bytes()))
        });

        trace!(collection, matched = documents.len(), "queried in-memory collection");

        documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(id, document)| -> StoreResult<(Uuid, Bson)> {
                let document = match &query.projection {
                    Some(fields) => project(document, fields)?,
                    None => document.clone(),
                };
                Ok((*id, document))
            })
            .collect()
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(0);
        };

        Ok(matching(collection_map, filter.as_ref())?.len() as u64)
    }

    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(document) = store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.get_mut(&id))
        else {
            return Ok(0);
        };

        if !DocumentEvaluator::matches(document, precondition.as_ref())? {
            return Ok(0);
        }

        // Apply to a copy so a failing modification leaves the stored document untouched.
        let mut updated = document.clone();
        apply_update(&mut updated, update)?;
        *document = updated;

        Ok(1)
    }

    async fn group_count(&self, filter: Option<Expr>, field: &str, collection: &str) -> StoreResult<Vec<(Bson, u64)>> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut groups: Vec<(Bson, u64)> = Vec::new();

        for (_, document) in matching(collection_map, filter.as_ref())? {
            let key = lookup(document, field).cloned().unwrap_or(Bson::Null);

            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, count)) => *count += 1,
                None => groups.push((key, 1)),
            }
        }

        Ok(groups)
    }

    async fn summarize(&self, filter: Option<Expr>, field: &str, collection: &str) -> StoreResult<FieldSummary> {
        let store = self.store.read().await;
        let Some(collection_map) = store.get(collection) else {
            return Ok(FieldSummary::default());
        };

        let mut summary = FieldSummary::default();

        for (_, document) in matching(collection_map, filter.as_ref())? {
            if let Some(value @ (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))) = lookup(document, field) {
                summary.add(as_f64(value));
            }
        }

        Ok(summary)
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.store.write().await.remove(name);

        Ok(())
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect())
    }

    async fn add_index(&self, _collection: &str, _field: &str, _unique: bool) -> StoreResult<()> {
        // No indexes in memory.
        Ok(())
    }

    async fn drop_index(&self, _collection: &str, _field: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use shelterdb_core::query::{Filter, Modifications};

    use super::*;

    fn animal(name: &str, age: i32) -> (Uuid, Bson) {
        let id = Uuid::new();
        (id, Bson::Document(doc! { "id": id, "name": name, "age": age, "version": 1_i64 }))
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryStore::new();
        let rex = animal("Rex", 3);

        store.insert_documents(vec![rex.clone()], "animals").await.unwrap();
        let error = store.insert_documents(vec![rex], "animals").await.unwrap_err();

        assert!(matches!(error, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn equal_sort_keys_fall_back_to_id() {
        let store = InMemoryStore::new();
        let documents = vec![animal("A", 2), animal("B", 2), animal("C", 2)];
        let mut ids = documents.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        ids.sort_by_key(|id| id.bytes());

        store.insert_documents(documents, "animals").await.unwrap();

        let query = Query::builder().sort("age", SortDirection::Desc).build();
        let listed = store
            .query_documents(query, "animals")
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn precondition_failure_leaves_document_untouched() {
        let store = InMemoryStore::new();
        let (id, document) = animal("Rex", 3);
        store.insert_documents(vec![(id, document.clone())], "animals").await.unwrap();

        let update = Modifications::default().set("name", "Max").inc("version", 1_i64);
        let matched = store
            .update_where(id, Some(Filter::eq("version", 2_i64)), update.into(), "animals")
            .await
            .unwrap();

        assert_eq!(matched, 0);
        assert_eq!(store.get_documents(vec![id], "animals").await.unwrap(), vec![document]);
    }

    #[tokio::test]
    async fn overflowing_counter_leaves_document_untouched() {
        let store = InMemoryStore::new();
        let id = Uuid::new();
        let document = Bson::Document(doc! { "id": id, "donation_count": i64::MAX, "total": 1.5 });
        store.insert_documents(vec![(id, document.clone())], "donors").await.unwrap();

        let update = Modifications::default().inc("total", 2.0).inc("donation_count", 1_i64);
        let error = store.update_where(id, None, update.into(), "donors").await.unwrap_err();

        assert!(matches!(error, StoreError::InvalidDocument(_)));
        assert_eq!(store.get_documents(vec![id], "donors").await.unwrap(), vec![document]);
    }

    #[tokio::test]
    async fn update_of_missing_document_matches_nothing() {
        let store = InMemoryStore::new();
        let matched = store
            .update_where(Uuid::new(), None, Update::inc("age", 1).into(), "animals")
            .await
            .unwrap();

        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn group_count_buckets_missing_values_as_null() {
        let store = InMemoryStore::new();
        let (id, _) = animal("Ghost", 1);
        store
            .insert_documents(
                vec![animal("Rex", 3), animal("Max", 3), (id, Bson::Document(doc! { "id": id }))],
                "animals",
            )
            .await
            .unwrap();

        let mut groups = store.group_count(None, "age", "animals").await.unwrap();
        groups.sort_by(|(left, _), (right, _)| sort_cmp(Some(left), Some(right)));

        assert_eq!(groups, vec![(Bson::Null, 1), (Bson::Int32(3), 2)]);
    }

    #[tokio::test]
    async fn summarize_skips_non_numeric_values() {
        let store = InMemoryStore::new();
        let (id, _) = animal("Odd", 0);
        store
            .insert_documents(
                vec![animal("Rex", 3), animal("Max", 5), (id, Bson::Document(doc! { "id": id, "age": "old" }))],
                "animals",
            )
            .await
            .unwrap();

        let summary = store.summarize(None, "age", "animals").await.unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.sum, 8.0);
        assert_eq!(summary.min, Some(3.0));
        assert_eq!(summary.max, Some(5.0));
    }
}
