//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{error::EngineResult, identity::NATIVE_ID_FIELD};

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Options recognized when constructing an [`Engine`](crate::engine::Engine).
///
/// Deserializable so it can be read from configuration files; missing fields take their
/// defaults.
///
/// ```ignore
/// let options = EngineOptions::from_json(r#"{ "id_property": "id" }"#)?;
/// assert_eq!(options.batch_size, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Name of the field exposed to callers as the document identity.
    pub id_property: String,
    /// Maximum number of documents a stream buffers per store round trip.
    pub batch_size: u32,
}

impl EngineOptions {
    pub fn with_id_property(mut self, id_property: impl Into<String>) -> Self {
        self.id_property = id_property.into();
        self
    }

    /// Sets the stream batch size. Zero is raised to one.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Parses options from a JSON object.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let options: EngineOptions = serde_json::from_str(json)?;
        let batch_size = options.batch_size;
        Ok(options.with_batch_size(batch_size))
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            id_property: NATIVE_ID_FIELD.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let options = EngineOptions::from_json(r#"{ "id_property": "id" }"#).unwrap();

        assert_eq!(options.id_property, "id");
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        assert_eq!(EngineOptions::default().with_batch_size(0).batch_size, 1);
        assert_eq!(EngineOptions::from_json(r#"{ "batch_size": 0 }"#).unwrap().batch_size, 1);
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = EngineOptions::from_json("{ id_property").unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::Serialization);
    }
}
