//! Identity normalization between the caller-facing identity property and the store's `_id`.
//!
//! Callers see identities as plain hex strings under a configurable property name. The store
//! keeps them as ObjectIds under `_id`. [`IdentityCodec`] converts values, and
//! [`IdentityNormalizer`] pairs a codec with the configured property name to rewrite whole
//! documents.

use std::{fmt::Debug, sync::Arc};

use bson::{Bson, Document, oid::ObjectId};

use crate::error::{EngineError, EngineResult};

/// The store's native identity field.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Converts identity values between their external and native representations.
///
/// `to_external` must be the exact inverse of `to_native` for every value the store produces.
pub trait IdentityCodec: Send + Sync + Debug {
    /// Converts a caller-supplied identity into the store's identity type.
    fn to_native(&self, value: &Bson) -> EngineResult<Bson>;

    /// Converts a store identity into its caller-facing representation.
    fn to_external(&self, native: &Bson) -> EngineResult<Bson>;
}

/// Codec mapping `ObjectId` to its 24 character lowercase hex string.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectIdCodec;

impl IdentityCodec for ObjectIdCodec {
    fn to_native(&self, value: &Bson) -> EngineResult<Bson> {
        match value {
            Bson::ObjectId(oid) => Ok(Bson::ObjectId(*oid)),
            Bson::String(hex) => ObjectId::parse_str(hex)
                .map(Bson::ObjectId)
                .map_err(|e| EngineError::InvalidIdentity(format!("'{hex}' is not a valid ObjectId: {e}"))),
            other => Err(EngineError::InvalidIdentity(format!(
                "expected an ObjectId hex string, got {other}"
            ))),
        }
    }

    fn to_external(&self, native: &Bson) -> EngineResult<Bson> {
        match native {
            Bson::ObjectId(oid) => Ok(Bson::String(oid.to_hex())),
            other => Err(EngineError::InvalidIdentity(format!(
                "stored identity {other} is not an ObjectId"
            ))),
        }
    }
}

/// Pairs an [`IdentityCodec`] with the caller-facing identity property name.
#[derive(Debug, Clone)]
pub struct IdentityNormalizer {
    id_property: String,
    codec: Arc<dyn IdentityCodec>,
}

impl IdentityNormalizer {
    pub fn new(id_property: impl Into<String>, codec: Arc<dyn IdentityCodec>) -> Self {
        Self {
            id_property: id_property.into(),
            codec,
        }
    }

    /// The identity property name callers use.
    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    /// Whether `field` names the caller-facing identity property.
    pub fn is_identity_field(&self, field: &str) -> bool {
        field == self.id_property
    }

    /// Maps a caller-facing field name to the name stored in the backend.
    pub fn native_field<'a>(&self, field: &'a str) -> &'a str {
        if self.is_identity_field(field) {
            NATIVE_ID_FIELD
        } else {
            field
        }
    }

    pub fn to_native(&self, value: &Bson) -> EngineResult<Bson> {
        self.codec.to_native(value)
    }

    pub fn to_external(&self, native: &Bson) -> EngineResult<Bson> {
        self.codec.to_external(native)
    }

    /// Rewrites a stored document for callers.
    ///
    /// `_id` is removed and its external form is placed first under the identity property.
    /// Documents without `_id` (projected away) are returned unchanged.
    pub fn normalize_document(&self, mut document: Document) -> EngineResult<Document> {
        let Some(native) = document.remove(NATIVE_ID_FIELD) else {
            return Ok(document);
        };

        let mut normalized = Document::new();
        normalized.insert(self.id_property.clone(), self.to_external(&native)?);
        // A stale copy of the property would shadow the store's identity.
        document.remove(&self.id_property);
        for (key, value) in document {
            normalized.insert(key, value);
        }

        Ok(normalized)
    }

    /// Splits the identity property off a caller-supplied document.
    ///
    /// Returns the remaining fields and the native identity, if one was supplied. Null and empty
    /// string identities are treated as absent so the store assigns one.
    pub fn extract_identity(&self, mut document: Document) -> EngineResult<(Document, Option<Bson>)> {
        let supplied = document.remove(&self.id_property);
        if self.id_property != NATIVE_ID_FIELD {
            document.remove(NATIVE_ID_FIELD);
        }

        let native = match supplied {
            None | Some(Bson::Null) => None,
            Some(Bson::String(s)) if s.is_empty() => None,
            Some(value) => Some(self.to_native(&value)?),
        };

        Ok((document, native))
    }
}

impl Default for IdentityNormalizer {
    fn default() -> Self {
        Self::new(NATIVE_ID_FIELD, Arc::new(ObjectIdCodec))
    }
}
