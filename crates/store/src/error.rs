use thiserror::Error;

/// Errors that can occur when interacting with the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or referential constraint rejected the write.
    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    /// A stored value could not be mapped back into a record.
    #[error("Corrupt value in column {column}: {reason}")]
    Decode { column: &'static str, reason: String },

    /// The store gave up on the transaction (serialization failure, timeout,
    /// injected fault).
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn constraint(name: impl Into<String>) -> Self {
        StoreError::ConstraintViolation {
            constraint: name.into(),
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && (db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation())
        {
            return StoreError::ConstraintViolation {
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            };
        }
        StoreError::Database(e)
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
