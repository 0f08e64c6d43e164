//! Core traits for document representation and serialization.
//!
//! Every record kind in the shelter store (animals, donations, settings, ...) is a
//! [`Document`]: a serde type with a UUID and a fixed collection name. Conversions to
//! and from BSON/JSON come for free through [`DocumentExt`].

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::StoreResult;

/// Core trait that all documents stored in a store must implement.
///
/// # Example
///
/// ```ignore
/// use shelterdb::document::Document;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Kennel {
///     pub id: Uuid,
///     pub label: String,
/// }
///
/// impl Document for Kennel {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "kennels"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "animals", "donations").
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> StoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> StoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> StoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> StoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> StoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> StoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_json(&self) -> StoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> StoreResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Converts a chrono timestamp into the BSON datetime stored in documents.
pub fn bson_datetime(at: chrono::DateTime<chrono::Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

/// Converts a stored BSON datetime back into a chrono timestamp.
pub fn chrono_datetime(at: bson::DateTime) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(at.timestamp_millis())
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}
