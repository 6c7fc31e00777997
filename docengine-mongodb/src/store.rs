use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, Cursor,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, trace};

use docengine_core::{
    backend::{
        BackendBuilder, BoxCursor, CollectionBackend, NativeCursor, NativeFindOptions, NativeUpdate,
        NativeUpdateOptions, UpdateOutcome,
    },
    error::{EngineError, EngineResult, StoreResult},
};

use crate::error::store_error;

/// A handle on one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    client: Client,
    collection: Collection<Document>,
}

impl MongoCollection {
    pub fn new(client: Client, database: &str, collection: &str) -> Self {
        Self {
            collection: client.database(database).collection(collection),
            client,
        }
    }

    pub fn builder(dsn: &str, database: &str, collection: &str) -> MongoCollectionBuilder {
        MongoCollectionBuilder::new(dsn, database, collection)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Shuts the client down, waiting for cursors and sessions to be released.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl CollectionBackend for MongoCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        let document = if document.contains_key("_id") {
            document
        } else {
            Document::from_iter(
                std::iter::once(("_id".to_string(), ObjectId::new().into()))
                    .chain(document),
            )
        };

        self.collection
            .insert_one(&document)
            .await
            .map_err(store_error)?;

        Ok(document)
    }

    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor> {
        let mut find_options = FindOptions::default();
        find_options.sort = options.sort;
        find_options.skip = options.skip;
        find_options.limit = options.limit;
        find_options.batch_size = options.batch_size;
        find_options.projection = options.projection;

        trace!(collection = self.name(), filter = %filter, "opening cursor");

        let cursor = self.collection
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(store_error)?;

        Ok(Box::new(MongoCursor { cursor }))
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        self.collection
            .find_one(filter)
            .await
            .map_err(store_error)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.collection
            .count_documents(filter)
            .await
            .map_err(store_error)
    }

    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome> {
        let result = match update {
            NativeUpdate::Modifiers(modifiers) if options.multi => self.collection
                .update_many(filter, modifiers)
                .upsert(options.upsert)
                .await,
            NativeUpdate::Modifiers(modifiers) => self.collection
                .update_one(filter, modifiers)
                .upsert(options.upsert)
                .await,
            NativeUpdate::Replacement(replacement) => self.collection
                .replace_one(filter, replacement)
                .upsert(options.upsert)
                .await,
        }
        .map_err(store_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        let result = if multi {
            self.collection.delete_many(filter).await
        } else {
            self.collection.delete_one(filter).await
        }
        .map_err(store_error)?;

        Ok(result.deleted_count)
    }
}

/// Batches documents off a driver cursor. Dropping it kills the server-side cursor.
struct MongoCursor {
    cursor: Cursor<Document>,
}

#[async_trait]
impl NativeCursor for MongoCursor {
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<Vec<Document>>> {
        let mut batch = Vec::new();

        while batch.len() < max.max(1) {
            match self.cursor.try_next().await.map_err(store_error)? {
                Some(document) => batch.push(document),
                None => break,
            }
        }

        Ok((!batch.is_empty()).then_some(batch))
    }
}

/// Builder for constructing [`MongoCollection`] instances.
///
/// # Example
///
/// ```ignore
/// use docengine::{backend::BackendBuilder, mongodb::MongoCollection};
///
/// let users = MongoCollection::builder("mongodb://localhost:27017", "app", "users")
///     .build()
///     .await?;
/// ```
pub struct MongoCollectionBuilder {
    dsn: String,
    database: String,
    collection: String,
}

impl MongoCollectionBuilder {
    pub fn new(dsn: &str, database: &str, collection: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl BackendBuilder for MongoCollectionBuilder {
    type Backend = MongoCollection;

    async fn build(self) -> EngineResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| EngineError::Initialization(e.to_string()))?,
        )
        .map_err(|e| EngineError::Initialization(e.to_string()))?;

        debug!(database = %self.database, collection = %self.collection, "connected to mongodb");

        Ok(MongoCollection::new(client, &self.database, &self.collection))
    }
}
