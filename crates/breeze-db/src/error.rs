//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / sea_query::error::Error / CoreError                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── outside a transaction: returned to the caller as-is          │
//! │       │                                                                 │
//! │       └── inside run_transaction:                                      │
//! │             rollback → WorkFailed(cause)                               │
//! │             rollback fails too → RollbackFailed { source, rollback }   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate retries. Every failure goes back to the caller.

use breeze_core::CoreError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - A single-row query (e.g. `INSERT ... RETURNING`) produced no row
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate value into a UNIQUE column
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a child whose parent id does not exist
    /// - Deleting a parent that still has children
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Malformed connection string
    /// - Database file can't be created or opened
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Configuration could not be loaded.
    ///
    /// ## When This Occurs
    /// - `DB_MAX_CONNECTIONS` or another numeric variable isn't a number
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A statement could not be built from its template.
    ///
    /// ## When This Occurs
    /// - Insert value count doesn't match the template's columns
    /// - Update called with no fields
    #[error("Statement build failed: {0}")]
    StatementBuild(String),

    /// A table, alias or column name was rejected.
    #[error("Invalid identifier: {0}")]
    Validation(#[from] CoreError),

    /// A row could not be converted into an entity.
    ///
    /// ## When This Occurs
    /// - Converter reads a column that isn't selected
    /// - Column type doesn't match the entity field
    #[error("Row conversion failed: {0}")]
    Conversion(String),

    /// The call context's deadline passed before the statement finished.
    #[error("Statement timed out")]
    Timeout,

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A transaction could not be started.
    #[error("can't begin transaction: {0}")]
    BeginFailed(String),

    /// The work function succeeded but `COMMIT` failed.
    #[error("tx commit failed: {0}")]
    CommitFailed(String),

    /// The work function failed, and rolling back failed as well.
    #[error("{source}; rollback failed: {rollback}")]
    RollbackFailed {
        source: Box<DbError>,
        rollback: String,
    },

    /// The work function failed; the transaction was rolled back.
    #[error("failed executing code inside transaction: {0}")]
    WorkFailed(#[source] Box<DbError>),

    /// The work function panicked; the panic was caught at the transaction
    /// boundary.
    #[error("panic recovered: {0}")]
    Panicked(String),

    /// A context still references a transaction that has already been
    /// committed or rolled back.
    #[error("transaction already closed")]
    TransactionClosed,

    /// Application code gave up on its own (e.g. a failed post-condition).
    #[error("Aborted: {0}")]
    Aborted(String),

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

    /// Creates an Aborted error, for work functions that reject their own
    /// results.
    pub fn aborted(reason: impl Into<String>) -> Self {
        DbError::Aborted(reason.into())
    }

    /// Wraps a converter failure.
    pub fn conversion(err: sqlx::Error) -> Self {
        DbError::Conversion(err.to_string())
    }

    /// The error that started a transactional failure, looking through
    /// `WorkFailed` and `RollbackFailed` wrappers.
    pub fn root_cause(&self) -> &DbError {
        match self {
            DbError::WorkFailed(inner) => inner.root_cause(),
            DbError::RollbackFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// sqlx::Error::ColumnDecode   → DbError::Conversion
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
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
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

            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => DbError::Conversion(err.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sea_query::error::Error> for DbError {
    fn from(err: sea_query::error::Error) -> Self {
        DbError::StatementBuild(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
