//! Conversions between engine documents and typed or JSON values.
//!
//! The engine works on [`bson::Document`]s. These helpers let callers keep their own serde
//! types at the edges.

use bson::{Document, deserialize_from_document, serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Serializes a value into a document.
///
/// # Errors
///
/// Returns an error if serialization fails or the value does not serialize to a map.
pub fn to_document<T: Serialize>(value: &T) -> EngineResult<Document> {
    Ok(serialize_to_document(value)?)
}

/// Deserializes a document into a typed value.
pub fn from_document<T: DeserializeOwned>(document: Document) -> EngineResult<T> {
    Ok(deserialize_from_document(document)?)
}

/// Converts a document into a JSON value.
///
/// Store-specific types such as ObjectIds serialize in their extended JSON form.
pub fn to_json(document: &Document) -> EngineResult<Value> {
    Ok(serde_json::to_value(document)?)
}

/// Converts a JSON object into a document.
///
/// # Errors
///
/// Returns [`EngineError::InvalidDocument`] when the value is not an object.
pub fn from_json(value: Value) -> EngineResult<Document> {
    if !value.is_object() {
        return Err(EngineError::InvalidDocument(format!("expected a JSON object, got {value}")));
    }

    Ok(serde_json::from_value(value)?)
}
