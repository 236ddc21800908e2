//! Storage-level errors shared by every repository.
//!
//! Repository traits in [`crate::repository`] return [`BantayResult`].
//! The SurrealDB layer converts its own `DbError` into [`BantayError`],
//! and the moderation service maps these again: a missing row becomes
//! `RecordNotFound`, anything the store could not do becomes
//! `StoreUnavailable`. Domain rules never produce a `BantayError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BantayError {
    /// No row for a user record, group or audit entry with this id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness constraint rejected the write, such as a duplicate
    /// group link.
    #[error("{entity} already exists")]
    AlreadyExists { entity: String },

    /// The store failed or returned a row that could not be decoded.
    #[error("Store error: {0}")]
    Database(String),
}

pub type BantayResult<T> = Result<T, BantayError>;
