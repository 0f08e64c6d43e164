//! Query and aggregation core for shelter operations data.
//!
//! This crate sits between the HTTP handlers and the document store and provides:
//!
//! - **Documents** ([`document`]) - The trait every stored entity implements
//! - **Store backend abstraction** ([`backend`]) - Traits implemented by the memory and MongoDB stores
//! - **Predicates** ([`query`]) - The filter AST, sort keys, projections and updates
//! - **Typed filters** ([`filter`]) - Per-entity filter structs compiled into predicates
//! - **Pagination** ([`page`]) - Clamped, deterministically ordered listings with totals
//! - **Merged listings** ([`merge`]) - One time-ordered feed over several collections
//! - **Statistics** ([`stats`]) - Grouped counts, sums, time windows and rates
//! - **Compare-and-swap** ([`versioned`]) - Version-guarded updates of shared documents
//! - **Counters** ([`counter`]) - Commutative store-side increments
//! - **Deadlines** ([`deadline`]) - Per-call time bounds
//! - **Error handling** ([`error`]) - The error taxonomy shared by every operation
//!
//! # Example
//!
//! ```ignore
//! use shelterdb::prelude::*;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//!
//! let page = store
//!     .typed_collection::<Animal>()
//!     .list(
//!         &AnimalFilter { species: Some("dog".into()), ..Default::default() },
//!         &PageRequest::builder().limit(20).build(),
//!     )
//!     .await?;
//! ```

pub mod backend;
pub mod collection;
pub mod counter;
pub mod deadline;
pub mod document;
pub mod error;
pub mod filter;
pub mod merge;
pub mod page;
pub mod query;
pub mod stats;
pub mod store;
pub mod versioned;
