//! Moderation error types.

use bantay_core::error::BantayError;
use bantay_core::models::user_record::VerificationState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("user is already verified")]
    AlreadyVerified,

    #[error("not a valid Philippine phone number: {0}")]
    InvalidPhoneFormat(String),

    #[error("contact card belongs to another user")]
    ContactSpoofingDetected,

    #[error("language test failed {attempts} times; verification rejected")]
    MaxAttemptsExceeded { attempts: u32 },

    #[error("user is whitelisted and exempt from enforcement")]
    Exempt,

    #[error("user is not banned")]
    NotBanned,

    #[error("caller {caller} is not an admin")]
    Unauthorized { caller: i64 },

    #[error("no record for user {0}")]
    RecordNotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("user is banned; file an appeal instead")]
    UserBanned,

    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: VerificationState,
    },

    #[error("a different phone number is already bound to this user")]
    PhoneAlreadyBound,

    #[error("an appeal is already pending")]
    AppealAlreadyPending,

    #[error("invalid input: {0}")]
    Validation(String),
}

impl ModerationError {
    /// Whether the caller may retry the same call later with backoff.
    pub fn is_operational(&self) -> bool {
        matches!(self, ModerationError::StoreUnavailable(_))
    }
}

impl From<BantayError> for ModerationError {
    fn from(err: BantayError) -> Self {
        match err {
            BantayError::NotFound { entity, id } => {
                ModerationError::RecordNotFound(format!("{entity} {id}"))
            }
            BantayError::AlreadyExists { entity } => {
                ModerationError::Validation(format!("{entity} already exists"))
            }
            BantayError::Database(msg) => ModerationError::StoreUnavailable(msg),
        }
    }
}

pub type ModerationResult<T> = Result<T, ModerationError>;
