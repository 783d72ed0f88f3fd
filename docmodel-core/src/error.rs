//! Error types and result types for model and collection operations.
//!
//! Every fallible operation in this crate returns [`ModelResult<T>`]. Failures are
//! never swallowed or retried here: a pre-save rejection, a missing record or a
//! backend failure surfaces as an [`ModelError`] to the immediate caller.

use std::error::Error as StdError;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Boxed, thread-safe error used to carry an opaque backend cause.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors produced by models, collections and store backends.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model's pre-save hook rejected the write.
    ///
    /// The hook's message is carried verbatim, so `to_string()` yields exactly what
    /// the hook returned.
    #[error("{0}")]
    ValidationFailed(String),
    /// The record addressed by a fetch or destroy does not exist.
    #[error("Record {id} not found in {namespace}")]
    NotFound {
        /// Resolved namespace that was searched.
        namespace: String,
        /// Identifier of the missing record.
        id: String,
    },
    /// The backing store failed. The original cause is kept as the error source.
    #[error("Store failure: {0}")]
    StoreFailure(#[source] BoxError),
    /// One operation of a bulk apply failed. Wraps the first failure observed.
    #[error("Bulk operation failed: {0}")]
    AggregateFailure(#[source] Box<ModelError>),
    /// A filter expression could not be translated into a store query.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    /// A record or attribute bag has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The operation needs a persisted identity but the model has no `id`.
    #[error("Model has no id")]
    MissingId,
    /// Conversion between JSON attributes and BSON records failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A backend could not be initialised or connected.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

/// Stable classification of a [`ModelError`], used for response shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationFailed,
    NotFound,
    StoreFailure,
    AggregateFailure,
    InvalidFilter,
    InvalidDocument,
    MissingId,
    Serialization,
    Initialization,
}

impl ErrorKind {
    /// Snake-case name emitted in error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StoreFailure => "store_failure",
            ErrorKind::AggregateFailure => "aggregate_failure",
            ErrorKind::InvalidFilter => "invalid_filter",
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::MissingId => "missing_id",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Initialization => "initialization",
        }
    }
}

impl ModelError {
    /// Wraps any backend error as a [`ModelError::StoreFailure`], preserving it as the source.
    pub fn store<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        ModelError::StoreFailure(err.into())
    }

    /// Builds a [`ModelError::NotFound`] for the given namespace and id.
    pub fn not_found(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        ModelError::NotFound {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ModelError::NotFound { .. } => ErrorKind::NotFound,
            ModelError::StoreFailure(_) => ErrorKind::StoreFailure,
            ModelError::AggregateFailure(_) => ErrorKind::AggregateFailure,
            ModelError::InvalidFilter(_) => ErrorKind::InvalidFilter,
            ModelError::InvalidDocument(_) => ErrorKind::InvalidDocument,
            ModelError::MissingId => ErrorKind::MissingId,
            ModelError::Serialization(_) => ErrorKind::Serialization,
            ModelError::Initialization(_) => ErrorKind::Initialization,
        }
    }

    /// HTTP-style status signal for this error.
    ///
    /// An aggregate failure reports the status of the failure it wraps.
    pub fn status_code(&self) -> u16 {
        match self {
            ModelError::ValidationFailed(_)
            | ModelError::InvalidFilter(_)
            | ModelError::InvalidDocument(_)
            | ModelError::MissingId => 400,
            ModelError::NotFound { .. } => 404,
            ModelError::StoreFailure(_) => 502,
            ModelError::AggregateFailure(inner) => inner.status_code(),
            ModelError::Serialization(_) | ModelError::Initialization(_) => 500,
        }
    }

    /// Returns the innermost error, unwrapping aggregate failures.
    pub fn root(&self) -> &ModelError {
        match self {
            ModelError::AggregateFailure(inner) => inner.root(),
            other => other,
        }
    }
}

/// A specialized `Result` type for model and collection operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for ModelError {
    fn from(err: SerdeJsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_verbatim() {
        let err = ModelError::ValidationFailed("foo reason".to_string());
        assert_eq!(err.to_string(), "foo reason");
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn aggregate_reports_inner_status() {
        let err = ModelError::AggregateFailure(Box::new(ModelError::not_found("tests", "abc")));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.root().kind(), ErrorKind::NotFound);
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn store_failure_keeps_source() {
        let io = std::io::Error::other("connection reset");
        let err = ModelError::store(io);
        assert_eq!(err.status_code(), 502);
        assert_eq!(
            StdError::source(&err).map(|s| s.to_string()),
            Some("connection reset".to_string())
        );
    }
}
