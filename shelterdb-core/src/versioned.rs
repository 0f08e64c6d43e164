//! Compare-and-swap updates for shared aggregate documents.
//!
//! A [`Versioned`] document carries a `version` stamp that starts at 1. Every successful
//! write is conditional on the stamp the writer last read and bumps it by exactly one, so of
//! any number of writers racing from the same version exactly one wins and the rest get
//! [`StoreError::Conflict`]. Nothing here retries: the caller re-reads and decides.

use bson::{Bson, Uuid};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::{Document, DocumentExt, bson_datetime},
    error::{ConflictError, StoreError, StoreResult},
    query::{Filter, Update},
};

/// Name of the version stamp field in stored documents.
pub const VERSION_FIELD: &str = "version";

/// A document guarded by a version stamp.
pub trait Versioned: Document {
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Records who changed the document and when.
    fn touch(&mut self, updated_by: &str, updated_at: DateTime<Utc>);
}

impl<'a, B: StoreBackend, D: Versioned> TypedCollection<'a, B, D> {
    /// Inserts `document` as version 1.
    pub async fn create_versioned(&self, mut document: D, created_by: &str) -> StoreResult<D> {
        document.set_version(1);
        document.touch(created_by, Utc::now());

        self.insert(vec![document.clone()]).await?;

        Ok(document)
    }

    /// Replaces the document with `mutate(current)`, provided nobody wrote since `current` was read.
    ///
    /// On success the returned document carries `current.version() + 1`, `updated_by` and the
    /// write time.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Conflict`] when the stored version differs from `current.version()`
    /// - [`StoreError::NotFound`] when the document no longer exists
    pub async fn update_versioned<F>(&self, current: &D, updated_by: &str, mutate: F) -> StoreResult<D>
    where
        F: FnOnce(D) -> D + Send,
    {
        let expected = current.version();
        let id = *current.id();

        let mut next = mutate(current.clone());
        next.set_version(expected + 1);
        next.touch(updated_by, Utc::now());

        let update = Update::replace(next.to_bson()?);

        self.options()
            .bounded(self.apply_versioned(id, expected, update))
            .await?;

        Ok(next)
    }

    /// Sets one field (typically a sub-object) and bumps the version under the same precondition.
    ///
    /// The returned document is the one this call wrote: the stored document at
    /// `expected_version` with the field, the version and the touch applied. Writes that land
    /// afterwards are not reflected.
    pub async fn update_versioned_field(
        &self,
        id: Uuid,
        expected_version: i64,
        field: &str,
        value: impl Into<Bson>,
        updated_by: &str,
    ) -> StoreResult<D> {
        let value = value.into();
        let updated_at = Utc::now();
        let update = Update::set(field, value.clone())
            .set("updated_by", updated_by)
            .set("updated_at", bson_datetime(updated_at))
            .inc(VERSION_FIELD, 1i64);

        self.options()
            .bounded(async {
                let stored = match self.get_one(id).await? {
                    None => return Err(StoreError::not_found(id, self.name())),
                    Some(stored) if stored.version() != expected_version => {
                        return Err(self.conflict(id, expected_version, stored.version()));
                    }
                    Some(stored) => stored,
                };

                self.apply_versioned(id, expected_version, update.into()).await?;

                // Versions only grow, so the precondition held against `stored`.
                let mut written = stored.to_bson()?;
                set_field(&mut written, field, value)?;

                let mut written = D::from_bson(written)?;
                written.set_version(expected_version + 1);
                written.touch(updated_by, updated_at);

                Ok(written)
            })
            .await
    }

    async fn apply_versioned(&self, id: Uuid, expected: i64, update: Update) -> StoreResult<()> {
        let matched = self
            .update_where(id, Some(Filter::eq(VERSION_FIELD, expected)), update)
            .await?;

        if matched == 1 {
            debug!(collection = self.name(), %id, version = expected + 1, "versioned update applied");
            return Ok(());
        }

        match self.get_one(id).await? {
            None => Err(StoreError::not_found(id, self.name())),
            Some(stored) => Err(self.conflict(id, expected, stored.version())),
        }
    }

    fn conflict(&self, id: Uuid, expected: i64, actual: i64) -> StoreError {
        info!(
            collection = self.name(),
            %id,
            expected_version = expected,
            actual_version = actual,
            "versioned update rejected"
        );

        ConflictError {
            collection: self.name().to_string(),
            id: id.to_string(),
            expected_version: expected,
            actual_version: actual,
        }
        .into()
    }
}

/// Assigns `value` at a possibly dotted `path`, creating intermediate documents.
fn set_field(document: &mut Bson, path: &str, value: Bson) -> StoreResult<()> {
    let mut current = document;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let Some(fields) = current.as_document_mut() else {
            return Err(StoreError::InvalidDocument(format!("cannot set {path}: {segment} is not inside a document")));
        };

        if segments.peek().is_none() {
            fields.insert(segment, value);
            return Ok(());
        }

        if !fields.contains_key(segment) {
            fields.insert(segment, bson::Document::new());
        }
        current = fields
            .get_mut(segment)
            .ok_or_else(|| StoreError::InvalidDocument(format!("cannot set {path}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use bson::bson;

    use super::*;

    #[test]
    fn set_field_replaces_nested_values() {
        let mut document = bson!({ "name": "Happy Paws", "branding": { "logo_url": "a.png", "accent": "red" } });

        set_field(&mut document, "branding", bson!({ "logo_url": "b.png" })).unwrap();
        set_field(&mut document, "contact.email", "hi@example.org".into()).unwrap();

        assert_eq!(
            document,
            bson!({
                "name": "Happy Paws",
                "branding": { "logo_url": "b.png" },
                "contact": { "email": "hi@example.org" }
            })
        );
    }

    #[test]
    fn set_field_refuses_to_descend_into_scalars() {
        let mut document = bson!({ "name": "Happy Paws" });
        assert!(set_field(&mut document, "name.first", "x".into()).is_err());
    }
}
