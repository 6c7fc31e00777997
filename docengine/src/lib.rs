//! Main docengine crate providing a unified interface over MongoDB-style collections.
//!
//! This crate is the primary entry point for users of docengine. It re-exports the core types
//! and functionality from the sub-crates and provides access to the storage backends.
//!
//! # Features
//!
//! - **Store-agnostic queries** - Tagged conditions translated to the store's native filters
//! - **Identity normalization** - Callers see string identities under a configurable property
//! - **Streaming results** - Lazy, order-preserving streams with at most one buffered batch
//! - **Multiple backends** - In-memory and MongoDB collections behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docengine::{prelude::*, memory::InMemoryCollection};
//! use bson::doc;
//! use futures::TryStreamExt;
//!
//! #[tokio::main]
//! async fn main() -> EngineResult<()> {
//!     let users = InMemoryCollection::builder().name("users").build().await?;
//!     let engine = Engine::new(users, EngineOptions::default().with_id_property("id"));
//!
//!     let alice = engine.create(doc! { "name": "Alice", "age": 30 }).await?;
//!     let bob = engine.create(doc! { "name": "Bob", "age": 25 }).await?;
//!
//!     // Everyone but Alice
//!     let others = engine
//!         .find(Query::from(doc! { "id": { "$ne": alice.get_str("id").unwrap() } }))
//!         .await?;
//!     assert_eq!(others, vec![bob.clone()]);
//!
//!     engine
//!         .update(
//!             Query::builder().clause(Filter::eq("id", bob.get_str("id").unwrap())).build(),
//!             Update::set(doc! { "age": 26 }),
//!             UpdateOptions::default(),
//!         )
//!         .await?;
//!
//!     // Stream instead of materializing
//!     let mut stream = engine.find_stream(Query::all());
//!     while let Some(user) = stream.try_next().await? {
//!         println!("{user}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory collections for development and testing
//! - [`mongodb`] - MongoDB collections (requires `mongodb` feature)

pub mod prelude;

pub use docengine_core::{
    backend, document, engine, error, identity, options, query, stream, translate, update,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory collection backend.
pub mod memory {
    pub use docengine_memory::{InMemoryCollection, InMemoryCollectionBuilder, codes};
}

/// MongoDB collection backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docengine_mongodb::{MongoCollection, MongoCollectionBuilder};
}
