//! MongoDB implementation of [`StoreBackend`].
//!
//! Documents are stored with their id duplicated into `_id`. Every query sorts on `_id` as its
//! final key, conditional updates put the precondition next to the `_id` match in a single
//! `update_one`/`replace_one`, and grouped counts and summaries run as aggregation pipelines.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{StreamExt, TryStreamExt, stream::iter};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::{debug, info};

use shelterdb_core::{
    backend::{FieldSummary, StoreBackend, StoreBackendBuilder},
    error::{StoreError, StoreResult},
    query::{Expr, Modifications, Query, SortDirection, Update},
};

use crate::{query::MongoQueryTranslator, sanitizer::KeySanitizer};

const DUPLICATE_KEY: i32 = 11000;
/// Server error code for creating a collection that already exists.
const NAMESPACE_EXISTS: i32 = 48;

fn unavailable(error: MongoError) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

/// Index into the inserted batch of the first duplicate-key failure, if that is what failed.
fn duplicate_index(error: &MongoError) -> Option<usize> {
    match error.kind.as_ref() {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()?
            .iter()
            .find(|e| e.code == DUPLICATE_KEY)
            .map(|e| e.index),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => Some(0),
        _ => None,
    }
}

fn as_u64(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => *n as u64,
        Some(Bson::Int64(n)) => *n as u64,
        Some(Bson::Double(n)) => *n as u64,
        _ => 0,
    }
}

fn as_f64(value: Option<&Bson>) -> Option<f64> {
    match value {
        Some(Bson::Int32(n)) => Some(*n as f64),
        Some(Bson::Int64(n)) => Some(*n as f64),
        Some(Bson::Double(n)) => Some(*n),
        _ => None,
    }
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&KeySanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(&self, id: &Uuid, document: &Bson) -> StoreResult<Document> {
        Ok(Document::from_iter(
            KeySanitizer::sanitize_value(document)
                .as_document()
                .cloned()
                .ok_or_else(|| StoreError::InvalidDocument("Expected document".into()))?
                .into_iter()
                .chain(vec![("_id".to_string(), id.into())]),
        ))
    }

    fn restore_document(&self, document: &Document) -> StoreResult<Bson> {
        Ok(KeySanitizer::restore_value(&Bson::Document(Document::from_iter(
            document
                .clone()
                .into_iter()
                .filter(|(k, _)| k != "_id"),
        ))))
    }

    fn document_id(&self, document: &Document) -> StoreResult<Uuid> {
        let id = document
            .get("_id")
            .cloned()
            .ok_or_else(|| StoreError::InvalidDocument("Stored document has no _id".into()))?;

        Ok(bson::deserialize_from_bson::<Uuid>(id)?)
    }

    /// `{$set, $inc}` for a set of modifications, omitting empty operators.
    fn modification_document(&self, update: &Modifications) -> Document {
        let mut modification = Document::new();

        if !update.set.is_empty() {
            modification.insert(
                "$set",
                Document::from_iter(
                    update
                        .set
                        .iter()
                        .map(|(field, value)| (field.clone(), KeySanitizer::sanitize_value(value))),
                ),
            );
        }
        if !update.inc.is_empty() {
            modification.insert("$inc", Document::from_iter(update.inc.iter().cloned()));
        }

        modification
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> StoreResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(unavailable)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(unavailable)
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> StoreResult<()> {
        let prepared = documents
            .iter()
            .map(|(id, doc)| self.prepare_document(id, doc))
            .collect::<StoreResult<Vec<Document>>>()?;

        match self.get_collection(collection).insert_many(prepared).await {
            Ok(_) => Ok(()),
            Err(error) => match duplicate_index(&error).and_then(|index| documents.get(index)) {
                Some((id, _)) => Err(StoreError::AlreadyExists { id: id.to_string(), collection: collection.to_string() }),
                None => Err(unavailable(error)),
            },
        }
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> StoreResult<()> {
        iter(documents)
            .then(async |(id, doc)| {
                let result = self
                    .get_collection(collection)
                    .replace_one(doc! { "_id": id }, self.prepare_document(&id, &doc)?)
                    .await
                    .map_err(unavailable)?;

                if result.matched_count == 0 {
                    return Err(StoreError::not_found(id, collection));
                }

                Ok(())
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> StoreResult<Vec<Bson>> {
        self.get_collection(collection)
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(unavailable)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(unavailable)?
            .iter()
            .map(|doc| self.restore_document(doc))
            .collect::<StoreResult<Vec<Bson>>>()
    }

    async fn query_documents(&self, query: Query, collection: &str) -> StoreResult<Vec<(Uuid, Bson)>> {
        let mut sort = Document::from_iter(query.sort.iter().map(|sort| {
            (
                sort.field.clone(),
                Bson::Int32(match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }),
            )
        }));
        sort.insert("_id", 1);

        let mut options = FindOptions::default();
        options.sort = Some(sort);
        options.limit = query.limit.map(|limit| limit as i64);
        options.skip = query.offset.map(|skip| skip as u64);
        options.projection = query
            .projection
            .as_ref()
            .map(|fields| Document::from_iter(fields.iter().map(|field| (field.clone(), Bson::Int32(1)))));

        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;

        debug!(collection, ?filter, "querying collection");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(unavailable)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(unavailable)?
            .iter()
            .map(|doc| -> StoreResult<(Uuid, Bson)> { Ok((self.document_id(doc)?, self.restore_document(doc)?)) })
            .collect::<StoreResult<Vec<(Uuid, Bson)>>>()
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> StoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::translate(filter.as_ref())?)
            .await
            .map_err(unavailable)
    }

    async fn update_where(
        &self,
        id: Uuid,
        precondition: Option<Expr>,
        update: Update,
        collection: &str,
    ) -> StoreResult<u64> {
        let filter = match precondition {
            Some(expr) => doc! { "$and": [{ "_id": id }, MongoQueryTranslator::translate(Some(&expr))?] },
            None => doc! { "_id": id },
        };

        let result = match &update {
            Update::Replace(document) => self
                .get_collection(collection)
                .replace_one(filter, self.prepare_document(&id, document)?)
                .await
                .map_err(unavailable)?,
            Update::Modify(modifications) => self
                .get_collection(collection)
                .update_one(filter, self.modification_document(modifications))
                .await
                .map_err(unavailable)?,
        };

        Ok(result.matched_count)
    }

    async fn group_count(&self, filter: Option<Expr>, field: &str, collection: &str) -> StoreResult<Vec<(Bson, u64)>> {
        let pipeline = vec![
            doc! { "$match": MongoQueryTranslator::translate(filter.as_ref())? },
            doc! { "$group": { "_id": format!("${field}"), "count": { "$sum": 1 } } },
        ];

        Ok(self
            .aggregate(collection, pipeline)
            .await?
            .iter()
            .map(|group| {
                (
                    KeySanitizer::restore_value(group.get("_id").unwrap_or(&Bson::Null)),
                    as_u64(group.get("count")),
                )
            })
            .collect())
    }

    async fn summarize(&self, filter: Option<Expr>, field: &str, collection: &str) -> StoreResult<FieldSummary> {
        let path = format!("${field}");
        let pipeline = vec![
            doc! {
                "$match": {
                    "$and": [
                        MongoQueryTranslator::translate(filter.as_ref())?,
                        { field: { "$type": "number" } },
                    ]
                }
            },
            doc! {
                "$group": {
                    "_id": Bson::Null,
                    "count": { "$sum": 1 },
                    "sum": { "$sum": path.as_str() },
                    "min": { "$min": path.as_str() },
                    "max": { "$max": path.as_str() },
                }
            },
        ];

        let Some(summary) = self.aggregate(collection, pipeline).await?.into_iter().next() else {
            return Ok(FieldSummary::default());
        };

        Ok(FieldSummary {
            count: as_u64(summary.get("count")),
            sum: as_f64(summary.get("sum")).unwrap_or_default(),
            min: as_f64(summary.get("min")),
            max: as_f64(summary.get("max")),
        })
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        match self
            .client
            .database(&self.database)
            .create_collection(&KeySanitizer::sanitize_string(name))
            .await
        {
            Ok(()) => Ok(()),
            Err(error) if matches!(error.kind.as_ref(), ErrorKind::Command(e) if e.code == NAMESPACE_EXISTS) => Ok(()),
            Err(error) => Err(unavailable(error)),
        }
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(unavailable)?
            .iter()
            .map(|name| KeySanitizer::restore_string(name))
            .collect())
    }

    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> StoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(unique).build())
                    .build(),
            )
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn drop_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        // Default name of an ascending single-field index.
        self.get_collection(collection)
            .drop_index(format!("{field}_1"))
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn shutdown(self) -> StoreResult<()> {
        self.shutdown().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| StoreError::Initialization(e.to_string()))?;

        info!(hosts = ?options.hosts, database = %self.database, "connecting to mongodb");

        Ok(MongoDbStore::new(
            Client::with_options(options).map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
