//! Managed group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A platform group whose membership the bot gatekeeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedGroup {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Public invite link (`https://t.me/...`).
    pub link: String,
    /// Platform chat id, known once the bot has been added to the group.
    pub chat_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateManagedGroup {
    pub name: String,
    pub description: String,
    pub link: String,
}
