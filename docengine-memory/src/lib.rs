//! In-memory collection backend for docengine.
//!
//! This crate provides a thread-safe, in-memory implementation of the `CollectionBackend` trait.
//! It evaluates the same native filter and update syntax the MongoDB backend forwards to the
//! server, and reports rejections with the server's messages and codes. Useful for development
//! and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use docengine::{prelude::*, memory::InMemoryCollection};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = InMemoryCollection::builder().name("users").build().await?;
//!     let engine = Engine::new(users, EngineOptions::default());
//!
//!     let alice = engine.create(doc! { "name": "Alice" }).await?;
//!     println!("{alice}");
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod evaluator;
mod modifier;

pub use store::{InMemoryCollection, InMemoryCollectionBuilder};

/// Error codes attached to store errors, matching the server's.
pub mod codes {
    pub const BAD_VALUE: i32 = 2;
    pub const FAILED_TO_PARSE: i32 = 9;
    pub const TYPE_MISMATCH: i32 = 14;
    pub const PATH_NOT_VIABLE: i32 = 28;
    pub const DOLLAR_PREFIXED_FIELD_NAME: i32 = 52;
    pub const IMMUTABLE_FIELD: i32 = 66;
    pub const DUPLICATE_KEY: i32 = 11000;
}
