//! Shared contact cards and the anti-spoofing rule.

use bantay_core::models::user_record::PlatformUserId;
use serde::Deserialize;

/// A contact card as delivered by the platform.
///
/// `owner_user_id` is the platform account the card describes; it is
/// `None` when the card was typed in by hand or belongs to someone who
/// is not on the platform.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContactPayload {
    pub owner_user_id: Option<PlatformUserId>,
    pub phone_number: String,
}

/// A contact card only verifies the user it belongs to.
///
/// Forwarded cards, hand-typed cards and cards of other accounts all
/// fail. This must hold before any other verification step runs.
pub fn is_own_contact(submitter: PlatformUserId, payload: &ContactPayload) -> bool {
    payload.owner_user_id == Some(submitter)
}
