//! Error types for the storage layer
//!
//! Every failure is logged where it happens and then handed back to the caller
//! as one of these variants. Nothing is retried and nothing is swallowed.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the database module
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Failure to obtain a usable connection to the database file
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The directory holding the database file could not be created
    #[error("failed to create database directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The connection pool could not be built (file unreadable, bad pragmas, ...)
    #[error("failed to open database at '{}': {source}", .path.display())]
    Pool {
        path: PathBuf,
        #[source]
        source: r2d2::Error,
    },

    /// No connection could be checked out of the pool in time
    #[error("failed to acquire connection to '{}': {source}", .path.display())]
    Checkout {
        path: PathBuf,
        #[source]
        source: r2d2::Error,
    },
}

/// Top-level storage error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A schema statement failed while initializing tables
    #[error("failed to create {object}: {source}")]
    Schema {
        object: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Required tables are still missing after initialization
    #[error("schema incomplete after initialization (missing: {})", .missing.join(", "))]
    SchemaIncomplete { missing: Vec<String> },

    /// A row-returning statement failed
    #[error("query failed: {source}")]
    Query {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A mutating statement failed (including constraint violations)
    #[error("statement failed: {source}")]
    Statement {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Beginning or committing a transaction failed
    #[error("transaction failed: {source}")]
    Transaction {
        #[source]
        source: rusqlite::Error,
    },

    /// One of the steps of the user upsert failed
    #[error("failed to ensure user '{external_id}': {source}")]
    Upsert {
        external_id: String,
        #[source]
        source: Box<StoreError>,
    },

    /// One of the steps of recording lesson progress failed
    #[error("failed to record progress of lesson {lesson_id} for user '{user_id}': {source}")]
    Progress {
        user_id: String,
        lesson_id: i64,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// The underlying SQLite error, if this failure came from the engine
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            StoreError::Schema { source, .. }
            | StoreError::Query { source, .. }
            | StoreError::Statement { source, .. }
            | StoreError::Transaction { source } => Some(source),
            StoreError::Upsert { source, .. } | StoreError::Progress { source, .. } => {
                source.sqlite_error()
            }
            StoreError::Connection(_) | StoreError::SchemaIncomplete { .. } => None,
        }
    }

    /// Whether the failure was a UNIQUE, NOT NULL, or FOREIGN KEY violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.sqlite_error(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
