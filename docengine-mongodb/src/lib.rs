//! MongoDB backend implementation for docengine.
//!
//! This crate provides a MongoDB-based implementation of the `CollectionBackend` trait. Filters
//! and update payloads arrive already in MongoDB syntax and are forwarded unchanged; server
//! rejections come back with the server's message and code.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docengine = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docengine::{prelude::*, backend::BackendBuilder, mongodb::MongoCollection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = MongoCollection::builder("mongodb://localhost:27017", "my_database", "users")
//!         .build()
//!         .await?;
//!     let engine = Engine::new(users, EngineOptions::default());
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod error;

pub use store::{MongoCollection, MongoCollectionBuilder};
