//! Lazily produced result streams.
//!
//! [`DocumentStream`] delivers the results of a find one normalized document at a time, in the
//! order the store's cursor yields them. It is a small state machine:
//!
//! ```text
//! Idle -> Fetching -> Emitting -> (Draining | Ended) -> Closed
//!             \__________\___________\_____________-> Errored -> Closed
//! ```
//!
//! The cursor is not opened until the stream is first polled, and at most one batch of native
//! documents is buffered at a time. Because consumers pull, a slow consumer simply leaves the
//! current batch in the buffer; nothing fetched is ever discarded before it is yielded. The
//! cursor is owned by the state machine and is released exactly once: when exhausted, on
//! error, on [`DocumentStream::close`], or when the stream is dropped.

use std::{
    collections::VecDeque,
    fmt, mem,
    pin::Pin,
    task::{Context, Poll},
};

use bson::Document;
use futures::{FutureExt, Stream, future::BoxFuture, stream::FusedStream};
use tracing::{debug, trace};

use crate::{
    backend::BoxCursor,
    error::{EngineError, EngineResult, StoreResult},
    identity::IdentityNormalizer,
};

pub(crate) type OpenFuture = BoxFuture<'static, StoreResult<BoxCursor>>;
type BatchFuture = BoxFuture<'static, (BoxCursor, StoreResult<Option<Vec<Document>>>)>;

enum Fetch {
    Open(OpenFuture),
    Batch(BatchFuture),
}

enum StreamState {
    /// Constructed; the cursor has not been requested yet.
    Idle(OpenFuture),
    /// Waiting on the store for the cursor or its next batch.
    Fetching(Fetch),
    /// Yielding buffered documents; the cursor may have more.
    Emitting(BoxCursor),
    /// Cursor exhausted and released; yielding what is left in the buffer.
    Draining,
    /// Everything was yielded; the end signal is pending.
    Ended,
    /// A failure is pending delivery.
    Errored(EngineError),
    Closed,
}

impl StreamState {
    fn name(&self) -> &'static str {
        match self {
            StreamState::Idle(_) => "idle",
            StreamState::Fetching(_) => "fetching",
            StreamState::Emitting(_) => "emitting",
            StreamState::Draining => "draining",
            StreamState::Ended => "ended",
            StreamState::Errored(_) => "errored",
            StreamState::Closed => "closed",
        }
    }
}

/// A stream of normalized documents produced from a store cursor.
///
/// Yields `Ok(document)` for every match in store order, then ends. A failure is yielded as a
/// single `Err` after which the stream ends without further documents.
pub struct DocumentStream {
    state: StreamState,
    buffer: VecDeque<Document>,
    normalizer: IdentityNormalizer,
    batch_size: usize,
    collection: String,
    emitted: usize,
}

impl DocumentStream {
    pub(crate) fn new(
        open: OpenFuture,
        normalizer: IdentityNormalizer,
        batch_size: u32,
        collection: String,
    ) -> Self {
        Self {
            state: StreamState::Idle(open),
            buffer: VecDeque::new(),
            normalizer,
            batch_size: batch_size.max(1) as usize,
            collection,
            emitted: 0,
        }
    }

    /// A stream whose only item is `error`.
    pub(crate) fn failed(error: EngineError, normalizer: IdentityNormalizer, collection: String) -> Self {
        Self {
            state: StreamState::Errored(error),
            buffer: VecDeque::new(),
            normalizer,
            batch_size: 1,
            collection,
            emitted: 0,
        }
    }

    /// Number of documents yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Number of fetched documents waiting to be yielded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, StreamState::Closed)
    }

    /// Stops the stream early, releasing the cursor. Later polls yield `None`.
    pub fn close(&mut self) {
        if !self.is_closed() {
            trace!(
                collection = %self.collection,
                state = self.state.name(),
                emitted = self.emitted,
                "closing document stream"
            );
        }

        self.buffer.clear();
        self.state = StreamState::Closed;
    }

    fn request_batch(&self, mut cursor: BoxCursor) -> StreamState {
        let max = self.batch_size;

        StreamState::Fetching(Fetch::Batch(
            async move {
                let batch = cursor.next_batch(max).await;
                (cursor, batch)
            }
            .boxed(),
        ))
    }

    fn release(&self, cursor: BoxCursor) {
        trace!(collection = %self.collection, "releasing cursor");
        drop(cursor);
    }

    fn fail(&mut self, error: EngineError) {
        debug!(
            collection = %self.collection,
            emitted = self.emitted,
            error = %error,
            "document stream failed"
        );

        self.buffer.clear();
        self.state = StreamState::Errored(error);
    }

    fn normalize(&mut self, document: Document) -> EngineResult<Document> {
        let document = self.normalizer.normalize_document(document)?;
        self.emitted += 1;
        Ok(document)
    }
}

impl Stream for DocumentStream {
    type Item = EngineResult<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match mem::replace(&mut this.state, StreamState::Closed) {
                StreamState::Idle(open) => {
                    trace!(collection = %this.collection, "opening cursor");
                    this.state = StreamState::Fetching(Fetch::Open(open));
                }
                StreamState::Fetching(Fetch::Open(mut open)) => match open.poll_unpin(cx) {
                    Poll::Pending => {
                        this.state = StreamState::Fetching(Fetch::Open(open));
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(cursor)) => this.state = this.request_batch(cursor),
                    Poll::Ready(Err(err)) => this.fail(err.into()),
                },
                StreamState::Fetching(Fetch::Batch(mut batch)) => match batch.poll_unpin(cx) {
                    Poll::Pending => {
                        this.state = StreamState::Fetching(Fetch::Batch(batch));
                        return Poll::Pending;
                    }
                    Poll::Ready((cursor, Ok(Some(documents)))) => {
                        trace!(collection = %this.collection, fetched = documents.len(), "fetched batch");
                        this.buffer.extend(documents);
                        this.state = StreamState::Emitting(cursor);
                    }
                    Poll::Ready((cursor, Ok(None))) => {
                        this.release(cursor);
                        this.state = StreamState::Draining;
                    }
                    Poll::Ready((cursor, Err(err))) => {
                        this.release(cursor);
                        this.fail(err.into());
                    }
                },
                StreamState::Emitting(cursor) => match this.buffer.pop_front() {
                    Some(document) => match this.normalize(document) {
                        Ok(document) => {
                            this.state = StreamState::Emitting(cursor);
                            return Poll::Ready(Some(Ok(document)));
                        }
                        Err(err) => {
                            this.release(cursor);
                            this.fail(err);
                        }
                    },
                    None => this.state = this.request_batch(cursor),
                },
                StreamState::Draining => match this.buffer.pop_front() {
                    Some(document) => match this.normalize(document) {
                        Ok(document) => {
                            this.state = StreamState::Draining;
                            return Poll::Ready(Some(Ok(document)));
                        }
                        Err(err) => this.fail(err),
                    },
                    None => this.state = StreamState::Ended,
                },
                StreamState::Ended => {
                    debug!(collection = %this.collection, emitted = this.emitted, "document stream ended");
                    return Poll::Ready(None);
                }
                StreamState::Errored(err) => return Poll::Ready(Some(Err(err))),
                StreamState::Closed => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for DocumentStream {
    fn is_terminated(&self) -> bool {
        self.is_closed()
    }
}

impl fmt::Debug for DocumentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStream")
            .field("collection", &self.collection)
            .field("state", &self.state.name())
            .field("buffered", &self.buffer.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}
