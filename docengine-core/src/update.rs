//! Update payloads and their options.

use bson::{Bson, Document};

/// The change an update applies to matching documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Merge the fields into the document (`$set`). An empty set means "no changes" and is
    /// still forwarded so the store can report on it.
    Set(Document),
    /// Replace the whole document, keeping its identity.
    Replace(Document),
    /// A document of store update operators, forwarded untouched.
    Operators(Document),
}

impl Update {
    pub fn set(fields: Document) -> Self {
        Update::Set(fields)
    }

    pub fn replace(document: Document) -> Self {
        Update::Replace(document)
    }

    pub fn operators(operators: Document) -> Self {
        Update::Operators(operators)
    }
}

/// Options for [`Engine::update`](crate::engine::Engine::update).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Create a document when nothing matches.
    pub upsert: bool,
    /// Apply to every matching document instead of the first.
    pub multi: bool,
}

impl UpdateOptions {
    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

/// Outcome of a successful update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    pub matched: u64,
    pub modified: u64,
    /// External identity of the document created by an upsert.
    pub upserted_id: Option<Bson>,
}
