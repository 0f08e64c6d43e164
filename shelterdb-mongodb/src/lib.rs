//! MongoDB backend for the shelter operations store.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Predicates
//! are translated to native query documents, so filtering, sorting, counting and grouping all
//! run inside MongoDB.
//!
//! To use this backend, enable the `mongodb` feature of the `shelterdb` crate:
//!
//! ```toml
//! [dependencies]
//! shelterdb = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use shelterdb::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! let backend = MongoDbStore::builder("mongodb://localhost:27017", "shelter")
//!     .build()
//!     .await?;
//! ```

pub mod query;
pub mod sanitizer;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
