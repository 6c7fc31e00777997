//! Convenient re-exports of commonly used types from docengine.
//!
//! ```ignore
//! use docengine::prelude::*;
//! ```

pub use docengine_core::{
    backend::{BackendBuilder, CollectionBackend},
    engine::Engine,
    error::{EngineError, EngineResult, ErrorKind, StoreError},
    identity::{IdentityCodec, ObjectIdCodec},
    options::EngineOptions,
    query::{
        Clause, Condition, Filter, FindOptions, LogicalOp, Query, QueryBuilder, Sort, SortDirection,
    },
    stream::DocumentStream,
    update::{Update, UpdateOptions, UpdateSummary},
};
