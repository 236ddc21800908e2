//! User record domain model.
//!
//! One [`UserRecord`] exists per platform user. It is created lazily on
//! first interaction and never deleted; banned and appealing users keep
//! their history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// External identifier assigned by the chat platform.
pub type PlatformUserId = i64;

/// Position of a user in the admission state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerificationState {
    Unverified,
    PhoneVerified,
    LanguagePassed,
    Verified,
    Rejected,
    Banned,
    Whitelisted,
}

impl VerificationState {
    pub const ALL: [VerificationState; 7] = [
        VerificationState::Unverified,
        VerificationState::PhoneVerified,
        VerificationState::LanguagePassed,
        VerificationState::Verified,
        VerificationState::Rejected,
        VerificationState::Banned,
        VerificationState::Whitelisted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::Unverified => "Unverified",
            VerificationState::PhoneVerified => "PhoneVerified",
            VerificationState::LanguagePassed => "LanguagePassed",
            VerificationState::Verified => "Verified",
            VerificationState::Rejected => "Rejected",
            VerificationState::Banned => "Banned",
            VerificationState::Whitelisted => "Whitelisted",
        }
    }

    /// Whether the user may take part in managed groups.
    pub fn is_admitted(&self) -> bool {
        matches!(
            self,
            VerificationState::Verified | VerificationState::Whitelisted
        )
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerificationState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown verification state: {s}"))
    }
}

/// Who caused a state change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Actor {
    System,
    User(PlatformUserId),
    Admin(PlatformUserId),
}

impl Actor {
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::System => "System",
            Actor::User(_) => "User",
            Actor::Admin(_) => "Admin",
        }
    }

    pub fn id(&self) -> Option<PlatformUserId> {
        match self {
            Actor::System => None,
            Actor::User(id) | Actor::Admin(id) => Some(*id),
        }
    }

    /// Rebuild an actor from its stored `kind` / `id` pair.
    pub fn from_parts(kind: &str, id: Option<PlatformUserId>) -> Option<Self> {
        match (kind, id) {
            ("System", _) => Some(Actor::System),
            ("User", Some(id)) => Some(Actor::User(id)),
            ("Admin", Some(id)) => Some(Actor::Admin(id)),
            _ => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::User(id) => write!(f, "user:{id}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

/// Category of a reported rule violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    Spam,
    Flooding,
    Advertising,
    OffensiveLanguage,
    NonFilipinoContent,
    Other,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 6] = [
        ViolationKind::Spam,
        ViolationKind::Flooding,
        ViolationKind::Advertising,
        ViolationKind::OffensiveLanguage,
        ViolationKind::NonFilipinoContent,
        ViolationKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Spam => "Spam",
            ViolationKind::Flooding => "Flooding",
            ViolationKind::Advertising => "Advertising",
            ViolationKind::OffensiveLanguage => "OffensiveLanguage",
            ViolationKind::NonFilipinoContent => "NonFilipinoContent",
            ViolationKind::Other => "Other",
        }
    }

    /// Human-readable strike reason.
    pub fn describe(&self) -> &'static str {
        match self {
            ViolationKind::Spam => "spam",
            ViolationKind::Flooding => "message flooding",
            ViolationKind::Advertising => "unsolicited advertising",
            ViolationKind::OffensiveLanguage => "offensive language",
            ViolationKind::NonFilipinoContent => "off-topic non-Filipino content",
            ViolationKind::Other => "rule violation",
        }
    }
}

impl FromStr for ViolationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViolationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown violation kind: {s}"))
    }
}

/// A recorded rule violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Strike {
    pub reason: String,
    pub kind: ViolationKind,
    pub evidence: String,
    pub issued_at: DateTime<Utc>,
    pub issued_by: Actor,
}

impl Strike {
    /// Whether the strike still counts at `now`. With no `ttl` it
    /// always does.
    pub fn is_active(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        ttl.is_none_or(|ttl| now.signed_duration_since(self.issued_at) < ttl)
    }
}

/// Details kept for an active ban.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BanDetails {
    pub reason: String,
    pub banned_at: DateTime<Utc>,
    pub issued_by: Actor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BanStatus {
    #[default]
    NotBanned,
    Banned(BanDetails),
    /// The ban stays in force while the appeal waits for an admin.
    AppealPending {
        ban: BanDetails,
        appealed_at: DateTime<Utc>,
    },
}

impl BanStatus {
    pub fn is_banned(&self) -> bool {
        !matches!(self, BanStatus::NotBanned)
    }

    pub fn details(&self) -> Option<&BanDetails> {
        match self {
            BanStatus::NotBanned => None,
            BanStatus::Banned(ban) | BanStatus::AppealPending { ban, .. } => Some(ban),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BanStatus::NotBanned => "NotBanned",
            BanStatus::Banned(_) => "Banned",
            BanStatus::AppealPending { .. } => "AppealPending",
        }
    }
}

/// Outcome of the most recent language test attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageTestResult {
    pub passed: bool,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: PlatformUserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub verification_state: VerificationState,
    /// E.164 `+63` number, bound by a successful contact share.
    pub phone_number: Option<String>,
    pub language_test: Option<LanguageTestResult>,
    /// Failed language attempts since the last reset.
    pub language_attempts: u32,
    pub strikes: Vec<Strike>,
    pub ban_status: BanStatus,
    /// Admin who whitelisted the user. Survives bans, so lifting a ban
    /// restores the whitelist.
    pub whitelisted_by: Option<Actor>,
    pub joined_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(user_id: PlatformUserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            verification_state: VerificationState::Unverified,
            phone_number: None,
            language_test: None,
            language_attempts: 0,
            strikes: Vec::new(),
            ban_status: BanStatus::NotBanned,
            whitelisted_by: None,
            joined_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_banned(&self) -> bool {
        self.ban_status.is_banned()
    }

    pub fn is_whitelisted(&self) -> bool {
        self.verification_state == VerificationState::Whitelisted
    }

    /// Strikes that still count towards the ban threshold.
    ///
    /// With no `ttl` every strike counts forever.
    pub fn active_strikes(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> usize {
        self.strikes.iter().filter(|s| s.is_active(now, ttl)).count()
    }

    /// The state the user earned through verification, ignoring bans.
    ///
    /// Used when a ban is lifted to put the user back where they were.
    pub fn earned_state(&self) -> VerificationState {
        if self.whitelisted_by.is_some() {
            VerificationState::Whitelisted
        } else if self.language_test.is_some_and(|t| t.passed) {
            VerificationState::Verified
        } else if self.phone_number.is_some() {
            VerificationState::PhoneVerified
        } else {
            VerificationState::Unverified
        }
    }
}
