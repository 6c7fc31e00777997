//! Backing store abstraction for the engine.
//!
//! The engine never talks to a database directly. It forwards already-translated filters and
//! payloads to a [`CollectionBackend`], a handle on one collection of a MongoDB-style store,
//! and reads results back through a [`NativeCursor`].
//!
//! Everything crossing this boundary is in the store's native form: identities live under
//! `_id` as the store's identity type, and filters use the store's operator syntax.
//!
//! # Traits
//!
//! - [`CollectionBackend`]: The primitives a backing collection exposes
//! - [`NativeCursor`]: Incremental retrieval of query results
//! - [`BackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docengine::backend::{CollectionBackend, NativeFindOptions};
//! use bson::doc;
//!
//! let stored = backend.insert_one(doc! { "name": "Alice" }).await?;
//! let mut cursor = backend.find(doc! { "name": "Alice" }, NativeFindOptions::default()).await?;
//! while let Some(batch) = cursor.next_batch(100).await? {
//!     println!("{batch:?}");
//! }
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt::Debug, sync::Arc};

use crate::error::{EngineResult, StoreResult};

/// Find options in the store's native form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeFindOptions {
    /// Sort document, e.g. `{ "_id": 1, "name": -1 }`.
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    /// Hint for how many documents the store should return per round trip.
    pub batch_size: Option<u32>,
    /// Projection document, e.g. `{ "name": 1 }`.
    pub projection: Option<Document>,
}

/// An update payload in the store's native form.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeUpdate {
    /// A document of update operators such as `{ "$set": { .. } }`.
    Modifiers(Document),
    /// A full replacement document.
    Replacement(Document),
}

/// Native options accompanying an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeUpdateOptions {
    pub upsert: bool,
    pub multi: bool,
}

/// What the store reports after an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Native identity of the upserted document, if one was created.
    pub upserted_id: Option<Bson>,
}

/// Incremental access to the results of a find.
///
/// Releasing the cursor is tied to ownership: dropping it releases any store-side resources,
/// so a cursor is released exactly once.
#[async_trait]
pub trait NativeCursor: Send {
    /// Fetches the next batch of at most `max` documents in store order.
    ///
    /// Returns `Ok(None)` once the cursor is exhausted. A returned batch is never empty.
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<Vec<Document>>>;
}

pub type BoxCursor = Box<dyn NativeCursor>;

/// A handle on one collection of the backing store.
///
/// Implementations are shared across concurrent operations and must not rely on the engine to
/// serialize calls. Errors are reported as [`StoreError`](crate::error::StoreError)s carrying the
/// store's own diagnostic.
#[async_trait]
pub trait CollectionBackend: Send + Sync + Debug {
    /// The collection name, for diagnostics.
    fn name(&self) -> &str;

    /// Inserts a document and returns it as stored, including the `_id` the store assigned
    /// when none was supplied.
    async fn insert_one(&self, document: Document) -> StoreResult<Document>;

    /// Opens a cursor over the documents matching `filter`.
    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor>;

    /// Returns the first document matching `filter`.
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Document) -> StoreResult<u64>;

    /// Applies `update` to the first (or, with `multi`, every) document matching `filter`.
    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome>;

    /// Removes the first (or, with `multi`, every) document matching `filter` and returns how
    /// many were removed.
    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64>;
}

#[async_trait]
impl<B> CollectionBackend for Arc<B>
where
    B: CollectionBackend + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        (**self).insert_one(document).await
    }

    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor> {
        (**self).find(filter, options).await
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        (**self).find_one(filter).await
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        (**self).count(filter).await
    }

    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome> {
        (**self)
            .update(filter, update, options)
            .await
    }

    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        (**self).remove(filter, multi).await
    }
}

#[async_trait]
pub trait BackendBuilder {
    type Backend: CollectionBackend;

    async fn build(self) -> EngineResult<Self::Backend>;
}
