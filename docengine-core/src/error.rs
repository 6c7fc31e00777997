//! Error types and result types for engine operations.
//!
//! Every engine operation resolves to a single [`EngineResult<T>`]. Failures are tagged with an
//! [`ErrorKind`] so callers can branch on the category without inspecting message text, while
//! store diagnostics are kept verbatim inside [`StoreError`].

use std::error::Error as StdError;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A failure reported by the backing store.
///
/// The message is the store's own diagnostic and is never rewritten by the engine. The
/// store-specific error code is kept when the store provides one, and the original driver
/// error is available through [`std::error::Error::source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    code: Option<i32>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl StoreError {
    /// Creates a store error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Attaches the store's numeric error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches the underlying driver error.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The store's diagnostic message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The store's error code, if it reported one.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

/// Category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value could not be translated into the store's representation. Never reaches the store.
    Translation,
    /// The backing store rejected the operation.
    Store,
    /// An update or removal matched no document.
    NotFound,
    /// The caller supplied a payload the engine cannot forward.
    InvalidDocument,
    /// Conversion between BSON, JSON and typed values failed.
    Serialization,
    /// The backend could not be constructed.
    Initialization,
}

/// Represents all possible errors that can occur when operating through the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The identity value cannot be represented by the store's identity type.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),
    /// The backing store reported a failure. Displayed verbatim.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No document matched the query of an update or removal.
    #[error("No document found matching {0}")]
    NotFound(String),
    /// The document or update payload has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during backend initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl EngineError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidIdentity(_) => ErrorKind::Translation,
            EngineError::Store(_) => ErrorKind::Store,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidDocument(_) => ErrorKind::InvalidDocument,
            EngineError::Serialization(_) => ErrorKind::Serialization,
            EngineError::Initialization(_) => ErrorKind::Initialization,
        }
    }

    /// Returns the store error when this failure came from the backing store.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            EngineError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// A specialized `Result` type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// A specialized `Result` type for backing store primitives.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for EngineError {
    fn from(err: BsonError) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for EngineError {
    fn from(err: SerdeJsonError) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
