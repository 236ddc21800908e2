//! SurrealDB implementation of [`UserRecordRepository`].
//!
//! A record is split over two tables: the flat `user_record` row and
//! its ordered `strike` rows. `save_with_audit` rewrites both, and
//! appends the audit entries describing the change, inside a single
//! transaction so readers never observe a half-written record.

use bantay_core::error::BantayResult;
use bantay_core::models::audit::CreateAuditEntry;
use bantay_core::models::user_record::{
    Actor, BanDetails, BanStatus, LanguageTestResult, PlatformUserId, Strike, UserRecord,
    VerificationState, ViolationKind,
};
use bantay_core::repository::{UserRecordCounts, UserRecordRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;
use crate::repository::audit::{APPEND_EVENTS, AuditInput};

#[derive(Debug, SurrealValue)]
struct UserRecordRow {
    user_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    verification_state: String,
    phone_number: Option<String>,
    language_passed: Option<bool>,
    language_tested_at: Option<DateTime<Utc>>,
    language_attempts: u32,
    ban_kind: String,
    ban_reason: Option<String>,
    banned_at: Option<DateTime<Utc>>,
    banned_by_kind: Option<String>,
    banned_by_id: Option<i64>,
    appealed_at: Option<DateTime<Utc>>,
    whitelisted_by_kind: Option<String>,
    whitelisted_by_id: Option<i64>,
    joined_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct StrikeRow {
    reason: String,
    kind: String,
    evidence: String,
    issued_at: DateTime<Utc>,
    issued_by_kind: String,
    issued_by_id: Option<i64>,
}

/// Strike as bound into the `save` transaction.
#[derive(Debug, Serialize)]
struct StrikeInput<'a> {
    seq: usize,
    reason: &'a str,
    kind: &'static str,
    evidence: &'a str,
    issued_at: DateTime<Utc>,
    issued_by_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    issued_by_id: Option<i64>,
}

#[derive(Debug, SurrealValue)]
struct StateCountRow {
    verification_state: String,
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct BanCountRow {
    ban_kind: String,
    total: u64,
}

fn parse_actor(kind: &str, id: Option<i64>) -> Result<Actor, DbError> {
    Actor::from_parts(kind, id).ok_or_else(|| DbError::Decode(format!("invalid actor: {kind}")))
}

impl StrikeRow {
    fn try_into_strike(self) -> Result<Strike, DbError> {
        Ok(Strike {
            kind: self
                .kind
                .parse::<ViolationKind>()
                .map_err(DbError::Decode)?,
            issued_by: parse_actor(&self.issued_by_kind, self.issued_by_id)?,
            reason: self.reason,
            evidence: self.evidence,
            issued_at: self.issued_at,
        })
    }
}

impl UserRecordRow {
    fn try_into_record(self, strikes: Vec<Strike>) -> Result<UserRecord, DbError> {
        let verification_state = self
            .verification_state
            .parse::<VerificationState>()
            .map_err(DbError::Decode)?;

        let language_test = match (self.language_passed, self.language_tested_at) {
            (Some(passed), Some(taken_at)) => Some(LanguageTestResult { passed, taken_at }),
            _ => None,
        };

        let ban_status = match self.ban_kind.as_str() {
            "NotBanned" => BanStatus::NotBanned,
            kind => {
                let ban = BanDetails {
                    reason: self.ban_reason.unwrap_or_default(),
                    banned_at: self
                        .banned_at
                        .ok_or_else(|| DbError::Decode("ban without timestamp".into()))?,
                    issued_by: parse_actor(
                        self.banned_by_kind.as_deref().unwrap_or_default(),
                        self.banned_by_id,
                    )?,
                };
                match kind {
                    "Banned" => BanStatus::Banned(ban),
                    "AppealPending" => BanStatus::AppealPending {
                        ban,
                        appealed_at: self
                            .appealed_at
                            .ok_or_else(|| DbError::Decode("appeal without timestamp".into()))?,
                    },
                    other => return Err(DbError::Decode(format!("unknown ban kind: {other}"))),
                }
            }
        };

        let whitelisted_by = self
            .whitelisted_by_kind
            .map(|kind| parse_actor(&kind, self.whitelisted_by_id))
            .transpose()?;

        Ok(UserRecord {
            user_id: self.user_id,
            username: self.username,
            first_name: self.first_name,
            verification_state,
            phone_number: self.phone_number,
            language_test,
            language_attempts: self.language_attempts,
            strikes,
            ban_status,
            whitelisted_by,
            joined_at: self.joined_at,
            last_activity_at: self.last_activity_at,
        })
    }
}

/// Record and strike rewrite; the caller appends the audit statement
/// and the commit.
const SAVE_RECORD: &str = "\
    BEGIN TRANSACTION; \
    UPSERT type::record('user_record', $id) SET \
    user_id = $user_id, \
    username = $username, first_name = $first_name, \
    verification_state = $verification_state, \
    phone_number = $phone_number, \
    language_passed = $language_passed, \
    language_tested_at = $language_tested_at, \
    language_attempts = $language_attempts, \
    ban_kind = $ban_kind, ban_reason = $ban_reason, \
    banned_at = $banned_at, \
    banned_by_kind = $banned_by_kind, \
    banned_by_id = $banned_by_id, \
    appealed_at = $appealed_at, \
    whitelisted_by_kind = $whitelisted_by_kind, \
    whitelisted_by_id = $whitelisted_by_id, \
    joined_at = $joined_at, \
    last_activity_at = $last_activity_at; \
    DELETE strike WHERE user_id = $user_id; \
    FOR $s IN $strikes { \
        CREATE strike SET user_id = $user_id, seq = $s.seq, \
        reason = $s.reason, kind = $s.kind, \
        evidence = $s.evidence, \
        issued_at = <datetime> $s.issued_at, \
        issued_by_kind = $s.issued_by_kind, \
        issued_by_id = $s.issued_by_id; \
    }; ";

/// SurrealDB implementation of the UserRecord repository.
#[derive(Clone)]
pub struct SurrealUserRecordRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRecordRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRecordRepository for SurrealUserRecordRepository<C> {
    async fn find(&self, user_id: PlatformUserId) -> BantayResult<Option<UserRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('user_record', $id); \
                 SELECT * FROM strike WHERE user_id = $user_id \
                 ORDER BY seq ASC",
            )
            .bind(("id", user_id.to_string()))
            .bind(("user_id", user_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRecordRow> = result.take(0).map_err(DbError::from)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let strike_rows: Vec<StrikeRow> = result.take(1).map_err(DbError::from)?;
        let strikes = strike_rows
            .into_iter()
            .map(StrikeRow::try_into_strike)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(Some(row.try_into_record(strikes)?))
    }

    async fn get(&self, user_id: PlatformUserId) -> BantayResult<UserRecord> {
        self.find(user_id).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "user_record".into(),
                id: user_id.to_string(),
            }
            .into()
        })
    }

    async fn save_with_audit(
        &self,
        record: &UserRecord,
        events: &[CreateAuditEntry],
    ) -> BantayResult<()> {
        let strikes: Vec<StrikeInput<'_>> = record
            .strikes
            .iter()
            .enumerate()
            .map(|(seq, s)| StrikeInput {
                seq,
                reason: &s.reason,
                kind: s.kind.as_str(),
                evidence: &s.evidence,
                issued_at: s.issued_at,
                issued_by_kind: s.issued_by.kind(),
                issued_by_id: s.issued_by.id(),
            })
            .collect();
        let strikes = serde_json::to_value(&strikes)
            .map_err(|e| DbError::Decode(format!("strike encoding failed: {e}")))?;
        let events: Vec<AuditInput<'_>> = events.iter().map(AuditInput::new).collect();
        let events = serde_json::to_value(&events)
            .map_err(|e| DbError::Decode(format!("audit encoding failed: {e}")))?;
        let query = [SAVE_RECORD, APPEND_EVENTS, "COMMIT TRANSACTION;"].concat();

        let ban = record.ban_status.details();
        let appealed_at = match &record.ban_status {
            BanStatus::AppealPending { appealed_at, .. } => Some(*appealed_at),
            _ => None,
        };

        let result = self
            .db
            .query(query)
            .bind(("id", record.user_id.to_string()))
            .bind(("user_id", record.user_id))
            .bind(("username", record.username.clone()))
            .bind(("first_name", record.first_name.clone()))
            .bind((
                "verification_state",
                record.verification_state.as_str().to_string(),
            ))
            .bind(("phone_number", record.phone_number.clone()))
            .bind(("language_passed", record.language_test.map(|t| t.passed)))
            .bind((
                "language_tested_at",
                record.language_test.map(|t| t.taken_at),
            ))
            .bind(("language_attempts", record.language_attempts))
            .bind(("ban_kind", record.ban_status.kind().to_string()))
            .bind(("ban_reason", ban.map(|b| b.reason.clone())))
            .bind(("banned_at", ban.map(|b| b.banned_at)))
            .bind(("banned_by_kind", ban.map(|b| b.issued_by.kind().to_string())))
            .bind(("banned_by_id", ban.and_then(|b| b.issued_by.id())))
            .bind(("appealed_at", appealed_at))
            .bind((
                "whitelisted_by_kind",
                record.whitelisted_by.map(|a| a.kind().to_string()),
            ))
            .bind(("whitelisted_by_id", record.whitelisted_by.and_then(|a| a.id())))
            .bind(("joined_at", record.joined_at))
            .bind(("last_activity_at", record.last_activity_at))
            .bind(("strikes", strikes))
            .bind(("events", events))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(DbError::from)?;

        Ok(())
    }

    async fn counts(&self) -> BantayResult<UserRecordCounts> {
        let mut result = self
            .db
            .query(
                "SELECT verification_state, count() AS total FROM user_record \
                 GROUP BY verification_state; \
                 SELECT ban_kind, count() AS total FROM user_record \
                 GROUP BY ban_kind",
            )
            .await
            .map_err(DbError::from)?;

        let state_rows: Vec<StateCountRow> = result.take(0).map_err(DbError::from)?;
        let ban_rows: Vec<BanCountRow> = result.take(1).map_err(DbError::from)?;

        let mut counts = UserRecordCounts::default();
        for row in state_rows {
            let state = row
                .verification_state
                .parse::<VerificationState>()
                .map_err(DbError::Decode)?;
            counts.total += row.total;
            counts.by_state.insert(state, row.total);
        }
        for row in ban_rows {
            match row.ban_kind.as_str() {
                "Banned" => counts.banned = row.total,
                "AppealPending" => counts.appeals_pending = row.total,
                _ => {}
            }
        }

        Ok(counts)
    }
}
