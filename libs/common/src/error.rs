//! Custom error types for the common library
//!
//! This module defines the error types raised by the database pool and by
//! the document store implementations.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by a [`crate::store::DocumentStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    /// A document with the same key already exists in the collection
    #[error("Duplicate key in collection {collection}: {key}")]
    Duplicate { collection: String, key: String },

    /// The document is missing a field the store relies on
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The query cannot be expressed by the store
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The document could not be encoded or decoded
    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing database failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        StoreError::Database(DatabaseError::Query(err))
    }
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
