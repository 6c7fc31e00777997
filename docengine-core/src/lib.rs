//! Core of the docengine project: a document-persistence engine that speaks a store-agnostic
//! contract and translates it onto a MongoDB-style backing collection.
//!
//! This crate provides:
//!
//! - **Engine** ([`engine`]) - create, read, find, update and remove with identity handling
//! - **Query API** ([`query`]) - Tagged conditions, builders and the query visitor
//! - **Translation** ([`translate`]) - Abstract queries and payloads to native filters
//! - **Identity normalization** ([`identity`]) - External identities to and from `_id`
//! - **Result streaming** ([`stream`]) - Lazy, order-preserving document streams
//! - **Backend abstraction** ([`backend`]) - The primitives a backing collection exposes
//! - **Error handling** ([`error`]) - Tagged errors keeping store diagnostics verbatim
//! - **Configuration** ([`options`]) - Engine options loadable from configuration
//! - **Document conversion** ([`document`]) - Typed and JSON conversions
//!
//! # Example
//!
//! ```ignore
//! use docengine::{prelude::*, memory::InMemoryCollection};
//! use bson::doc;
//!
//! let engine = Engine::new(
//!     InMemoryCollection::new("users"),
//!     EngineOptions::default().with_id_property("id"),
//! );
//!
//! let alice = engine.create(doc! { "name": "Alice" }).await?;
//! let others = engine
//!     .find(Query::builder().clause(Filter::ne("id", alice.get_str("id")?)).build())
//!     .await?;
//! ```

pub mod backend;
pub mod document;
pub mod engine;
pub mod error;
pub mod identity;
pub mod options;
pub mod query;
pub mod stream;
pub mod translate;
pub mod update;
