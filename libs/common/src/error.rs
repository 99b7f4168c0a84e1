//! Custom error types for the common library
//!
//! This module defines the storage error taxonomy shared by every service.
//! PostgreSQL constraint violations the services act on are classified so
//! callers can turn them into domain answers ("username taken", "slot taken")
//! instead of generic failures.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// SQLSTATE raised by a `UNIQUE` or primary key violation
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised by an `EXCLUDE` constraint violation
const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE raised by a foreign key violation
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred while bootstrapping the schema
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// An exclusion constraint rejected the write
    #[error("Exclusion constraint violated: {0}")]
    ExclusionViolation(String),

    /// A foreign key constraint rejected the write
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
}

impl DatabaseError {
    /// Classify a query error, singling out constraint violations
    pub fn from_query(err: SqlxError) -> Self {
        let classified = err.as_database_error().and_then(|db_err| {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => Some(DatabaseError::UniqueViolation(constraint)),
                Some(EXCLUSION_VIOLATION) => Some(DatabaseError::ExclusionViolation(constraint)),
                Some(FOREIGN_KEY_VIOLATION) => Some(DatabaseError::ForeignKeyViolation(constraint)),
                _ => None,
            }
        });

        classified.unwrap_or(DatabaseError::Query(err))
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        DatabaseError::from_query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
