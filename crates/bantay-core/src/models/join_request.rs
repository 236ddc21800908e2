//! Group join request domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user_record::PlatformUserId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JoinRequestStatus {
    /// Waiting for the user to finish verification.
    Pending,
    Approved,
    Declined,
    /// The platform refused the approval call.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub user_id: PlatformUserId,
    pub chat_id: i64,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
}
