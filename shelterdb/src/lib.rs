//! Query and aggregation core for a shelter-operations document store.
//!
//! This crate is the entry point of the workspace. It re-exports the core modules, the
//! storage backends, and the shelter record types built on them.
//!
//! # Features
//!
//! - **Typed listings** - per-record filters compile to store predicates; pages carry totals
//! - **Merged feeds** - one date-ordered page over several collections
//! - **Statistics** - grouped counts, sums, time windows and rates from one spec
//! - **Safe shared writes** - version-checked updates and atomic counters
//!
//! # Quick Start
//!
//! ```ignore
//! use shelterdb::{config::ShelterConfig, entities, prelude::*};
//! use shelterdb::entities::animal::{Animal, AnimalFilter, AnimalStatus};
//!
//! #[tokio::main]
//! async fn main() -> StoreResult<()> {
//!     let config = ShelterConfig::load(None).expect("config");
//!     shelterdb::telemetry::init(&config.log_level).ok();
//!
//!     let store = config.connect().await?;
//!     entities::ensure_indexes(&store).await?;
//!
//!     let animals = store.typed_collection::<Animal>();
//!     let page = animals
//!         .list(
//!             &AnimalFilter { status: Some(AnimalStatus::Available), ..Default::default() },
//!             &PageRequest::builder().limit(20).sort_by("name.en").build(),
//!         )
//!         .await?;
//!
//!     println!("{} of {} available animals", page.data.len(), page.total);
//!
//!     let stats = animals.statistics(&StatsRequest::default()).await?;
//!     println!("adopted this month: {}", stats.window("adopted_this_month"));
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - in-process storage for development and tests
//! - `mongodb` - MongoDB storage (requires the `mongodb` feature)

pub mod config;
pub mod entities;
pub mod prelude;
pub mod telemetry;

pub use shelterdb_core::{
    backend, collection, counter, deadline, document, error, filter, merge, page, query, stats, store, versioned,
};

pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use shelterdb_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use shelterdb_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
