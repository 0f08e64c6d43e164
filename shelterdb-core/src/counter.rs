//! Atomic accumulation on stored documents.
//!
//! Running totals (lifetime donations, volunteer hours, stock levels) are only ever added to,
//! so they are written as store-side increments with no read and no version check. Increments
//! commute: any interleaving of concurrent calls ends at the same value.

use bson::{Bson, Uuid};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::{Document, bson_datetime},
    error::{StoreError, StoreResult},
    query::Modifications,
};

/// A batch of increments applied to one document in a single atomic write.
///
/// ```ignore
/// let donors = store.typed_collection::<Donor>();
/// donors
///     .counter(donor_id)
///     .add("total_donated", 50.0)
///     .add("donation_count", 1)
///     .touch("last_donation_date", donated_at)
///     .apply()
///     .await?;
/// ```
#[must_use = "a counter does nothing until applied"]
pub struct Counter<'c, 'a, B: StoreBackend, D: Document> {
    collection: &'c TypedCollection<'a, B, D>,
    id: Uuid,
    modifications: Modifications,
}

impl<'c, 'a, B: StoreBackend, D: Document> Counter<'c, 'a, B, D> {
    /// Adds `delta` to a numeric field. Missing fields start from zero.
    pub fn add(mut self, field: &str, delta: impl Into<Bson>) -> Self {
        self.modifications = self.modifications.inc(field, delta);
        self
    }

    /// Sets a timestamp field alongside the increments.
    pub fn touch(mut self, field: &str, at: DateTime<Utc>) -> Self {
        self.modifications = self.modifications.set(field, bson_datetime(at));
        self
    }

    /// Applies every increment atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when the document does not exist.
    pub async fn apply(self) -> StoreResult<()> {
        if self.modifications.is_empty() {
            return Ok(());
        }

        let collection = self.collection;
        let id = self.id;

        debug!(collection = collection.name(), %id, fields = self.modifications.inc.len(), "applying counter");

        let matched = collection
            .options()
            .bounded(collection.update_where(id, None, self.modifications.into()))
            .await?;

        if matched == 0 {
            return Err(StoreError::not_found(id, collection.name()));
        }

        Ok(())
    }
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    /// Starts a batch of increments on the document `id`.
    pub fn counter(&self, id: Uuid) -> Counter<'_, 'a, B, D> {
        Counter { collection: self, id, modifications: Modifications::default() }
    }

    /// Adds `delta` to `field` on the document `id`.
    pub async fn increment(&self, id: Uuid, field: &str, delta: impl Into<Bson>) -> StoreResult<()> {
        self.counter(id).add(field, delta).apply().await
    }
}
