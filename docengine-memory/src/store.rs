//! In-memory collection backend.
//!
//! Documents live in insertion order behind an async-aware read-write lock. Every operation
//! scans the collection; there are no indexes.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::trace;

use docengine_core::{
    backend::{
        BackendBuilder, BoxCursor, CollectionBackend, NativeCursor, NativeFindOptions, NativeUpdate,
        NativeUpdateOptions, UpdateOutcome,
    },
    error::{EngineResult, StoreError, StoreResult},
};

use crate::{
    codes,
    evaluator::{DocumentEvaluator, compare_documents, project},
    modifier,
};

/// Thread-safe in-memory collection.
///
/// `InMemoryCollection` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// shared across async tasks. Clones share the same documents.
///
/// # Example
///
/// ```ignore
/// use docengine_memory::InMemoryCollection;
/// use docengine::backend::CollectionBackend;
/// use bson::doc;
///
/// let users = InMemoryCollection::new("users");
/// let stored = users.insert_one(doc! { "name": "Alice" }).await?;
/// assert!(stored.get_object_id("_id").is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    documents: Arc<RwLock<Vec<Document>>>,
    /// Number of cursors handed out and not yet dropped
    open_cursors: Arc<AtomicUsize>,
}

impl InMemoryCollection {
    /// Creates a new empty collection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a builder for constructing an `InMemoryCollection`.
    ///
    /// ```ignore
    /// let users = InMemoryCollection::builder().name("users").build().await?;
    /// ```
    pub fn builder() -> InMemoryCollectionBuilder {
        InMemoryCollectionBuilder::default()
    }

    /// Number of cursors currently open against this collection.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn duplicate_key(&self, id: &Bson) -> StoreError {
        StoreError::new(format!(
            "E11000 duplicate key error collection: {} index: _id_ dup key: {{ _id: {id} }}",
            self.name
        ))
        .with_code(codes::DUPLICATE_KEY)
    }

    fn matching_positions(documents: &[Document], filter: &Document, multi: bool) -> StoreResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(filter)? {
                positions.push(position);
                if !multi {
                    break;
                }
            }
        }

        Ok(positions)
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new("documents")
    }
}

#[async_trait]
impl CollectionBackend for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        let stored = match document.get("_id") {
            Some(_) => document,
            None => {
                let mut stored = Document::new();
                stored.insert("_id", ObjectId::new());
                for (key, value) in document {
                    stored.insert(key, value);
                }
                stored
            }
        };

        let mut documents = self.documents.write().await;
        let id = stored.get("_id").cloned().unwrap_or(Bson::Null);

        if documents.iter().any(|existing| existing.get("_id") == Some(&id)) {
            return Err(self.duplicate_key(&id));
        }

        documents.push(stored.clone());
        trace!(collection = %self.name, id = %id, "inserted document");

        Ok(stored)
    }

    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor> {
        let documents = self.documents.read().await;
        let mut results = DocumentEvaluator::filter_documents(documents.iter(), &filter)?;
        drop(documents);

        if let Some(sort) = &options.sort {
            results.sort_by(|a, b| compare_documents(a, b, sort));
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        let results = results
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document, projection),
                None => document,
            })
            .collect::<VecDeque<_>>();

        trace!(collection = %self.name, filter = %filter, matched = results.len(), "opened cursor");

        Ok(Box::new(MemoryCursor::new(results, Arc::clone(&self.open_cursors))))
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        let documents = self.documents.read().await;

        for document in documents.iter() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        let positions = Self::matching_positions(&documents, &filter, true)?;

        Ok(positions.len() as u64)
    }

    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome> {
        modifier::validate(&update)?;

        let mut documents = self.documents.write().await;
        let positions = Self::matching_positions(&documents, &filter, options.multi)?;

        if positions.is_empty() {
            if !options.upsert {
                return Ok(UpdateOutcome::default());
            }

            let seed = match &update {
                NativeUpdate::Modifiers(_) => modifier::seed_from_filter(&filter)?,
                NativeUpdate::Replacement(_) => {
                    let mut seed = Document::new();
                    if let Some(id) = modifier::seed_from_filter(&filter)?.get("_id") {
                        seed.insert("_id", id.clone());
                    }
                    seed
                }
            };
            let applied = modifier::apply(&seed, &update)?;

            let mut upserted = Document::new();
            let id = match applied.get("_id") {
                Some(Bson::Null) | None => Bson::ObjectId(ObjectId::new()),
                Some(id) => id.clone(),
            };
            upserted.insert("_id", id.clone());
            for (key, value) in applied {
                if key != "_id" {
                    upserted.insert(key, value);
                }
            }

            if documents.iter().any(|existing| existing.get("_id") == Some(&id)) {
                return Err(self.duplicate_key(&id));
            }

            documents.push(upserted);
            trace!(collection = %self.name, id = %id, "upserted document");

            return Ok(UpdateOutcome {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(id),
            });
        }

        // Apply to copies first so a failure part way leaves the collection untouched.
        let mut updated = Vec::with_capacity(positions.len());
        for &position in &positions {
            updated.push((position, modifier::apply(&documents[position], &update)?));
        }

        let mut modified_count = 0;
        for (position, document) in updated {
            if documents[position] != document {
                documents[position] = document;
                modified_count += 1;
            }
        }

        trace!(collection = %self.name, matched = positions.len(), modified = modified_count, "updated documents");

        Ok(UpdateOutcome {
            matched_count: positions.len() as u64,
            modified_count,
            upserted_id: None,
        })
    }

    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        let mut documents = self.documents.write().await;
        let positions = Self::matching_positions(&documents, &filter, multi)?;

        for &position in positions.iter().rev() {
            documents.remove(position);
        }

        trace!(collection = %self.name, removed = positions.len(), "removed documents");

        Ok(positions.len() as u64)
    }
}

/// Cursor over a snapshot of matching documents.
///
/// Counts itself in the collection's open cursors until dropped.
struct MemoryCursor {
    documents: VecDeque<Document>,
    open_cursors: Arc<AtomicUsize>,
}

impl MemoryCursor {
    fn new(documents: VecDeque<Document>, open_cursors: Arc<AtomicUsize>) -> Self {
        open_cursors.fetch_add(1, Ordering::SeqCst);
        Self { documents, open_cursors }
    }
}

#[async_trait]
impl NativeCursor for MemoryCursor {
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<Vec<Document>>> {
        if self.documents.is_empty() {
            return Ok(None);
        }

        let take = max.max(1).min(self.documents.len());
        Ok(Some(self.documents.drain(..take).collect()))
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.open_cursors.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builder for constructing [`InMemoryCollection`] instances.
///
/// # Example
///
/// ```ignore
/// use docengine_memory::InMemoryCollection;
/// use docengine::backend::BackendBuilder;
///
/// let users = InMemoryCollection::builder()
///     .name("users")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCollectionBuilder {
    name: Option<String>,
    documents: Vec<Document>,
}

impl InMemoryCollectionBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Seeds the collection with documents, inserted in order when built.
    pub fn documents(mut self, documents: impl IntoIterator<Item = Document>) -> Self {
        self.documents.extend(documents);
        self
    }
}

#[async_trait]
impl BackendBuilder for InMemoryCollectionBuilder {
    type Backend = InMemoryCollection;

    async fn build(self) -> EngineResult<Self::Backend> {
        let collection = match self.name {
            Some(name) => InMemoryCollection::new(name),
            None => InMemoryCollection::default(),
        };

        for document in self.documents {
            collection.insert_one(document).await?;
        }

        Ok(collection)
    }
}
