//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── Guard / Validation: expected outcomes the caller surfaces    │
//! │       │   to the user as a message, state unchanged                    │
//! │       ├── Consistency: invariant breach observed, a defect signal      │
//! │       └── the rest: storage failures, propagate up uncaught            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use oficina_core::{GuardViolation, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// Wraps sqlx errors with context, and carries the domain-level soft
/// failures (guard violations, validation) across the repository boundary.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Duplicate license plate or catalog name
    /// - The partial unique indexes guarding conversion / current location
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Referencing a missing vehicle/department/service type
    /// - Deleting a quote that a work order references
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// An illegal lifecycle transition. Soft failure: the caller shows the
    /// reason to the user and nothing was written.
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    /// Field-level validation failure. Soft failure, nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An invariant the schema and transactions are supposed to make
    /// impossible was observed (e.g. two open location rows for one
    /// vehicle). Not user-recoverable; indicates a defect.
    #[error("Consistency failure: {message}")]
    Consistency { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Consistency error.
    pub fn consistency(message: impl Into<String>) -> Self {
        DbError::Consistency {
            message: message.into(),
        }
    }

    /// True for the soft failures a caller is expected to handle by showing
    /// a message, rather than treating as an infrastructure outage.
    pub fn is_soft(&self) -> bool {
        matches!(self, DbError::Guard(_) | DbError::Validation(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error messages for constraints:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_violations_are_soft() {
        let err: DbError = GuardViolation::QuoteExpired {
            quote_id: "q-1".to_string(),
        }
        .into();
        assert!(err.is_soft());
        assert_eq!(err.to_string(), "quote q-1 has expired");
    }

    #[test]
    fn test_storage_errors_are_hard() {
        assert!(!DbError::PoolExhausted.is_soft());
        assert!(!DbError::consistency("two open rows").is_soft());
    }
}
