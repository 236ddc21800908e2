//! Database-specific error types and conversions.

use bantay_core::error::BantayError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },
}

impl From<DbError> for BantayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => BantayError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => BantayError::AlreadyExists { entity },
            other => BantayError::Database(other.to_string()),
        }
    }
}
