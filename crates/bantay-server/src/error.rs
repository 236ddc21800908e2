//! Server error types.

use bantay_db::DbError;
use bantay_moderation::ModerationError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Moderation(#[from] ModerationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed event: {0}")]
    MalformedEvent(#[from] serde_json::Error),
}
