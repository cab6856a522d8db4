//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// A unique constraint rejected the write
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// A persisted value no longer parses into its domain type
    #[error("corrupt record: {0}")]
    Decode(String),
}

impl DbError {
    /// Map unique-violation errors to `Duplicate`, everything else to `Sqlx`
    pub fn from_sqlx(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                return Self::Duplicate(what.to_string());
            }
        }
        Self::Sqlx(err)
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result alias for database operations
pub type DbResult<T> = Result<T, DbError>;
