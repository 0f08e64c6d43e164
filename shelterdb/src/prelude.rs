//! Convenient re-exports of commonly used types.
//!
//! ```ignore
//! use shelterdb::prelude::*;
//! ```

pub use shelterdb_core::{
    backend::{DynStoreBackend, FieldSummary, StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    counter::Counter,
    document::{Document, DocumentExt},
    error::{ConflictError, StoreError, StoreResult},
    filter::{FilterFields, FilterSpec, ListRequest, Predicates},
    merge::{MergeSource, MergedRecord},
    page::{Listing, PagePolicy, PageRequest, PageResult, SortOrder},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection, Update},
    stats::{
        AggregationSpec, RateSpec, ScalarRef, StatResult, StatsPreset, StatsRequest, SumSpec, TimeWindow, WindowSpec,
    },
    store::{DocumentStore, DynDocumentStore, IndexSpec, Indexed, StoreOptions},
    versioned::Versioned,
};

pub use crate::config::ShelterConfig;
