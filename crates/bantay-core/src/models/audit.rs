//! Audit log domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user_record::{Actor, PlatformUserId};

/// Kind of state transition recorded in the audit log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditEventKind {
    ContactVerified,
    ContactRejected,
    /// Security event: a contact card carried someone else's identity.
    ContactSpoofingDetected,
    LanguageTestPassed,
    LanguageTestFailed,
    VerificationRejected,
    StrikeIssued,
    UserBanned,
    AppealFiled,
    AppealDenied,
    UserUnbanned,
    UserWhitelisted,
    StrikesReset,
    VerificationReset,
}

impl AuditEventKind {
    pub const ALL: [AuditEventKind; 14] = [
        AuditEventKind::ContactVerified,
        AuditEventKind::ContactRejected,
        AuditEventKind::ContactSpoofingDetected,
        AuditEventKind::LanguageTestPassed,
        AuditEventKind::LanguageTestFailed,
        AuditEventKind::VerificationRejected,
        AuditEventKind::StrikeIssued,
        AuditEventKind::UserBanned,
        AuditEventKind::AppealFiled,
        AuditEventKind::AppealDenied,
        AuditEventKind::UserUnbanned,
        AuditEventKind::UserWhitelisted,
        AuditEventKind::StrikesReset,
        AuditEventKind::VerificationReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::ContactVerified => "ContactVerified",
            AuditEventKind::ContactRejected => "ContactRejected",
            AuditEventKind::ContactSpoofingDetected => "ContactSpoofingDetected",
            AuditEventKind::LanguageTestPassed => "LanguageTestPassed",
            AuditEventKind::LanguageTestFailed => "LanguageTestFailed",
            AuditEventKind::VerificationRejected => "VerificationRejected",
            AuditEventKind::StrikeIssued => "StrikeIssued",
            AuditEventKind::UserBanned => "UserBanned",
            AuditEventKind::AppealFiled => "AppealFiled",
            AuditEventKind::AppealDenied => "AppealDenied",
            AuditEventKind::UserUnbanned => "UserUnbanned",
            AuditEventKind::UserWhitelisted => "UserWhitelisted",
            AuditEventKind::StrikesReset => "StrikesReset",
            AuditEventKind::VerificationReset => "VerificationReset",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown audit event kind: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: PlatformUserId,
    pub event_kind: AuditEventKind,
    pub detail: String,
    pub actor: Actor,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    pub user_id: PlatformUserId,
    pub event_kind: AuditEventKind,
    pub detail: String,
    pub actor: Actor,
    pub outcome: AuditOutcome,
}
