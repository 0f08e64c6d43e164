//! Error types and result types for store operations.
//!
//! Every fallible operation in the workspace returns [`StoreResult<T>`]. The variants
//! split into two groups: outcomes a caller is expected to act on ([`StoreError::NotFound`],
//! [`StoreError::Conflict`], [`StoreError::InvalidRange`]) and failures of the
//! underlying store ([`StoreError::Unavailable`]), which are propagated as-is and never
//! retried here.

use bson::error::Error as BsonError;
use serde::Serialize;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    #[error("Document {id} already exists in collection {collection}")]
    AlreadyExists { id: String, collection: String },
    /// The targeted document does not exist.
    #[error("Document {id} not found in collection {collection}")]
    NotFound { id: String, collection: String },
    /// A conditional write was rejected because the stored version moved on.
    #[error("{0}")]
    Conflict(ConflictError),
    /// A time range whose end lies before its start.
    #[error("Invalid range: end {end} is before start {start}")]
    InvalidRange { start: String, end: String },
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The underlying store call failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The caller's deadline elapsed before the store call completed.
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),
}

/// Details of a rejected compare-and-swap write.
///
/// Serializes as `{"id", "expected_version", "actual_version"}` so the HTTP layer can
/// hand it to clients as-is alongside a conflict status.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Version conflict on {collection}/{id}: expected version {expected_version}, found {actual_version}")]
pub struct ConflictError {
    #[serde(skip)]
    pub collection: String,
    pub id: String,
    pub expected_version: i64,
    pub actual_version: i64,
}

impl StoreError {
    pub fn not_found(id: impl ToString, collection: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.to_string(), collection: collection.into() }
    }

    /// Returns `true` for version conflicts, which callers surface as a refresh-and-retry status.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Returns the conflict details if this is a [`StoreError::Conflict`].
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            StoreError::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<ConflictError> for StoreError {
    fn from(err: ConflictError) -> Self {
        StoreError::Conflict(err)
    }
}

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
