//! Error types for chatbot-logger

use thiserror::Error;

/// Errors raised while connecting to or preparing the SurrealDB backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits.
///
/// `NotFound` is the only variant that means "the record genuinely does not
/// exist". Everything else is a store failure and must not be mistaken for
/// absence.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record of `kind` matched `key`
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The backend failed to execute the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A string could not be parsed as a record hash
    #[error("invalid record hash: {hash}")]
    InvalidHash { hash: String },

    /// A record could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        StorageError::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// True when the error reports genuine absence rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
