#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use bson::Document;
use docengine::{
    backend::{
        BoxCursor, CollectionBackend, NativeCursor, NativeFindOptions, NativeUpdate, NativeUpdateOptions,
        UpdateOutcome,
    },
    error::{StoreError, StoreResult},
    memory::InMemoryCollection,
};

/// Wraps an in-memory collection, delaying every store round trip.
#[derive(Debug, Clone)]
pub struct SlowCollection {
    pub inner: InMemoryCollection,
    pub delay: Duration,
}

impl SlowCollection {
    pub fn new(inner: InMemoryCollection, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

struct SlowCursor {
    inner: BoxCursor,
    delay: Duration,
}

#[async_trait]
impl NativeCursor for SlowCursor {
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<Vec<Document>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.next_batch(max).await
    }
}

#[async_trait]
impl CollectionBackend for SlowCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert_one(document).await
    }

    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor> {
        tokio::time::sleep(self.delay).await;
        let inner = self.inner.find(filter, options).await?;
        Ok(Box::new(SlowCursor { inner, delay: self.delay }))
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        self.inner.find_one(filter).await
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.update(filter, update, options).await
    }

    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        self.inner.remove(filter, multi).await
    }
}

/// Wraps an in-memory collection whose cursors fail after their first batch.
#[derive(Debug, Clone)]
pub struct FlakyCollection {
    pub inner: InMemoryCollection,
}

struct FlakyCursor {
    inner: BoxCursor,
    served: bool,
}

#[async_trait]
impl NativeCursor for FlakyCursor {
    async fn next_batch(&mut self, max: usize) -> StoreResult<Option<Vec<Document>>> {
        if self.served {
            return Err(StoreError::new("cursor id 42 not found").with_code(43));
        }
        self.served = true;
        self.inner.next_batch(max).await
    }
}

#[async_trait]
impl CollectionBackend for FlakyCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Document> {
        self.inner.insert_one(document).await
    }

    async fn find(&self, filter: Document, options: NativeFindOptions) -> StoreResult<BoxCursor> {
        let inner = self.inner.find(filter, options).await?;
        Ok(Box::new(FlakyCursor { inner, served: false }))
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        self.inner.find_one(filter).await
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    async fn update(
        &self,
        filter: Document,
        update: NativeUpdate,
        options: NativeUpdateOptions,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.update(filter, update, options).await
    }

    async fn remove(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        self.inner.remove(filter, multi).await
    }
}
