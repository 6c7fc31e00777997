//! The engine: create, find, update and remove against a backing collection.
//!
//! [`Engine`] is the store-agnostic surface callers program against. Each operation translates
//! its query and identities into the store's native form, forwards the call to the shared
//! [`CollectionBackend`], and maps the result back to caller-facing documents.
//!
//! # Example
//!
//! ```ignore
//! use docengine::{prelude::*, memory::InMemoryCollection};
//! use bson::doc;
//!
//! let engine = Engine::new(InMemoryCollection::new("users"), EngineOptions::default());
//!
//! let alice = engine.create(doc! { "name": "Alice" }).await?;
//! let found = engine
//!     .find(Query::builder().clause(Filter::eq("_id", alice.get_str("_id")?)).build())
//!     .await?;
//!
//! // Without a materialized result, stream the matches instead.
//! let mut stream = engine.find_stream(Query::all());
//! while let Some(document) = stream.try_next().await? {
//!     println!("{document}");
//! }
//! ```

use std::sync::Arc;

use bson::{Bson, Document};
use futures::{FutureExt, TryStreamExt};
use tracing::debug;

use crate::{
    backend::{CollectionBackend, NativeUpdate, NativeUpdateOptions},
    error::{EngineError, EngineResult},
    identity::{IdentityCodec, IdentityNormalizer, NATIVE_ID_FIELD, ObjectIdCodec},
    options::EngineOptions,
    query::{FindOptions, Query},
    stream::DocumentStream,
    translate::QueryTranslator,
    update::{Update, UpdateOptions, UpdateSummary},
};

/// A document-persistence engine bound to one backing collection.
///
/// Cloning is cheap and clones share the backend handle. The engine keeps no state of its own:
/// concurrent calls are forwarded as they arrive and rely on the store for consistency.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type, possibly `dyn CollectionBackend`
#[derive(Debug)]
pub struct Engine<B: CollectionBackend + ?Sized> {
    backend: Arc<B>,
    normalizer: IdentityNormalizer,
    options: EngineOptions,
}

impl<B: CollectionBackend + ?Sized> Clone for Engine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            normalizer: self.normalizer.clone(),
            options: self.options.clone(),
        }
    }
}

impl<B: CollectionBackend + 'static> Engine<B> {
    /// Creates an engine owning the given backend.
    pub fn new(backend: B, options: EngineOptions) -> Self {
        Self::from_shared(Arc::new(backend), options)
    }
}

impl<B: CollectionBackend + ?Sized + 'static> Engine<B> {
    /// Creates an engine over a backend handle shared with other engines.
    pub fn from_shared(backend: Arc<B>, options: EngineOptions) -> Self {
        Self::with_codec(backend, options, Arc::new(ObjectIdCodec))
    }

    /// Creates an engine with a custom identity codec.
    pub fn with_codec(backend: Arc<B>, options: EngineOptions, codec: Arc<dyn IdentityCodec>) -> Self {
        Self {
            normalizer: IdentityNormalizer::new(options.id_property.clone(), codec),
            backend,
            options,
        }
    }

    /// The identity property exposed on every returned document.
    pub fn id_property(&self) -> &str {
        self.normalizer.id_property()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Inserts a document and returns it as stored, with its identity in external form.
    ///
    /// A supplied identity is converted to the store's type first; a null or empty identity lets
    /// the store assign one.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidIdentity`] if the supplied identity cannot be converted (the store
    /// is not called), or the store's own error verbatim.
    pub async fn create(&self, document: Document) -> EngineResult<Document> {
        let (fields, native_id) = self.normalizer.extract_identity(document)?;

        let mut native = Document::new();
        if let Some(id) = native_id {
            native.insert(NATIVE_ID_FIELD, id);
        }
        for (key, value) in fields {
            native.insert(key, value);
        }

        let stored = self
            .backend
            .insert_one(native)
            .await
            .inspect_err(|e| debug!(collection = self.backend.name(), error = %e, "create rejected by store"))?;
        let created = self.normalizer.normalize_document(stored)?;

        debug!(
            collection = self.backend.name(),
            id = ?created.get(self.id_property()),
            "created document"
        );

        Ok(created)
    }

    /// Fetches the document with the given external identity.
    pub async fn read(&self, id: impl Into<Bson>) -> EngineResult<Option<Document>> {
        let filter = self.identity_filter(id.into())?;

        self.backend
            .find_one(filter)
            .await?
            .map(|document| self.normalizer.normalize_document(document))
            .transpose()
    }

    /// Returns every matching document in store order.
    pub async fn find(&self, query: Query) -> EngineResult<Vec<Document>> {
        self.find_with(query, FindOptions::default()).await
    }

    /// Returns every matching document, sorted, paged and projected per `options`.
    pub async fn find_with(&self, query: Query, options: FindOptions) -> EngineResult<Vec<Document>> {
        let documents: Vec<Document> = self
            .find_stream_with(query, options)
            .try_collect()
            .await?;

        debug!(collection = self.backend.name(), found = documents.len(), "find completed");

        Ok(documents)
    }

    /// Returns the first matching document.
    pub async fn find_one(&self, query: Query) -> EngineResult<Option<Document>> {
        let filter = self.translator().translate(&query)?;

        self.backend
            .find_one(filter)
            .await?
            .map(|document| self.normalizer.normalize_document(document))
            .transpose()
    }

    /// Streams the matching documents instead of materializing them.
    ///
    /// Returns immediately; the store is not contacted until the stream is first polled. A
    /// query that fails translation yields a stream whose only item is the error.
    pub fn find_stream(&self, query: Query) -> DocumentStream {
        self.find_stream_with(query, FindOptions::default())
    }

    /// Streams the matching documents, sorted, paged and projected per `options`.
    pub fn find_stream_with(&self, query: Query, options: FindOptions) -> DocumentStream {
        let collection = self.backend.name().to_string();

        let filter = match self.translator().translate(&query) {
            Ok(filter) => filter,
            Err(err) => return DocumentStream::failed(err, self.normalizer.clone(), collection),
        };
        let native_options = self
            .translator()
            .translate_options(&options, self.options.batch_size);

        debug!(collection = %collection, filter = %filter, "streaming find");

        let backend = Arc::clone(&self.backend);
        let open = async move { backend.find(filter, native_options).await }.boxed();

        DocumentStream::new(open, self.normalizer.clone(), self.options.batch_size, collection)
    }

    /// Counts the matching documents.
    pub async fn count(&self, query: Query) -> EngineResult<u64> {
        let filter = self.translator().translate(&query)?;

        Ok(self.backend.count(filter).await?)
    }

    /// Applies `update` to the first matching document, or every match with
    /// [`UpdateOptions::multi`].
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when nothing matched and `upsert` was not requested. Store
    /// rejections of the payload, including an empty set, are returned verbatim as
    /// [`EngineError::Store`].
    pub async fn update(
        &self,
        query: Query,
        update: Update,
        options: UpdateOptions,
    ) -> EngineResult<UpdateSummary> {
        let mut translator = self.translator();
        let filter = translator.translate(&query)?;
        let native = translator.translate_update(update)?;

        if options.multi && matches!(native, NativeUpdate::Replacement(_)) {
            return Err(EngineError::InvalidDocument(
                "a replacement can only be applied to a single document".into(),
            ));
        }

        let outcome = self
            .backend
            .update(
                filter.clone(),
                native,
                NativeUpdateOptions {
                    upsert: options.upsert,
                    multi: options.multi,
                },
            )
            .await
            .inspect_err(|e| debug!(collection = self.backend.name(), error = %e, "update rejected by store"))?;

        if outcome.matched_count == 0 && outcome.upserted_id.is_none() {
            return Err(EngineError::NotFound(filter.to_string()));
        }

        let upserted_id = outcome
            .upserted_id
            .as_ref()
            .map(|id| self.normalizer.to_external(id))
            .transpose()?;

        debug!(
            collection = self.backend.name(),
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            upserted = upserted_id.is_some(),
            "updated documents"
        );

        Ok(UpdateSummary {
            matched: outcome.matched_count,
            modified: outcome.modified_count,
            upserted_id,
        })
    }

    /// Removes every matching document and returns how many were removed.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when nothing matched.
    pub async fn remove(&self, query: Query) -> EngineResult<u64> {
        let filter = self.translator().translate(&query)?;

        self.remove_native(filter, true).await
    }

    /// Removes the document with the given external identity.
    pub async fn delete(&self, id: impl Into<Bson>) -> EngineResult<()> {
        let filter = self.identity_filter(id.into())?;

        self.remove_native(filter, false).await?;

        Ok(())
    }

    async fn remove_native(&self, filter: Document, multi: bool) -> EngineResult<u64> {
        let removed = self.backend.remove(filter.clone(), multi).await?;

        if removed == 0 {
            return Err(EngineError::NotFound(filter.to_string()));
        }

        debug!(collection = self.backend.name(), removed, "removed documents");

        Ok(removed)
    }

    fn identity_filter(&self, id: Bson) -> EngineResult<Document> {
        let mut filter = Document::new();
        filter.insert(NATIVE_ID_FIELD, self.normalizer.to_native(&id)?);
        Ok(filter)
    }

    fn translator(&self) -> QueryTranslator<'_> {
        QueryTranslator::new(&self.normalizer)
    }
}
