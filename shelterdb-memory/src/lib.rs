//! In-memory document storage backend.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates the same predicates, sort orders, projections and conditional updates as the
//! MongoDB backend, which makes it the store of choice for tests and local development.
//!
//! # Quick Start
//!
//! ```ignore
//! use shelterdb::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//! let animals = store.typed_collection::<Animal>();
//!
//! animals.insert(vec![animal]).await?;
//! ```

pub mod evaluator;
pub mod path;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
