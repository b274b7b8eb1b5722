//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// SQLite primary result codes that signal a transient lock conflict.
const SQLITE_BUSY: u32 = 5;
const SQLITE_LOCKED: u32 = 6;

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

impl DatabaseError {
    /// Whether repeating the failed operation may succeed.
    ///
    /// Pool exhaustion and SQLite busy/locked conditions are transient; every
    /// other failure is reported as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::Connection(err) | DatabaseError::Query(err) => is_transient(err),
            DatabaseError::Migration(_) | DatabaseError::Configuration(_) => false,
        }
    }

    /// Whether the error is a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// Database-reported message, if any.
    pub fn database_message(&self) -> Option<&str> {
        match self {
            DatabaseError::Query(SqlxError::Database(db)) => Some(db.message()),
            _ => None,
        }
    }
}

fn is_transient(err: &SqlxError) -> bool {
    match err {
        SqlxError::PoolTimedOut => true,
        SqlxError::Database(db) => db
            .code()
            .and_then(|code| code.parse::<u32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
