//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! Entry ids are UUIDv7, so ordering by record id is insertion order.

use bantay_core::error::BantayResult;
use bantay_core::models::audit::{AuditEntry, AuditEventKind, AuditOutcome, CreateAuditEntry};
use bantay_core::models::user_record::Actor;
use bantay_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use serde::Serialize;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    user_id: i64,
    event_kind: String,
    detail: String,
    actor_kind: String,
    actor_id: Option<i64>,
    outcome: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    user_id: i64,
    event_kind: String,
    detail: String,
    actor_kind: String,
    actor_id: Option<i64>,
    outcome: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Audit entry as bound into a multi-statement transaction.
#[derive(Debug, Serialize)]
pub(crate) struct AuditInput<'a> {
    id: String,
    user_id: i64,
    event_kind: &'static str,
    detail: &'a str,
    actor_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor_id: Option<i64>,
    outcome: &'static str,
}

impl<'a> AuditInput<'a> {
    pub(crate) fn new(entry: &'a CreateAuditEntry) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: entry.user_id,
            event_kind: entry.event_kind.as_str(),
            detail: &entry.detail,
            actor_kind: entry.actor.kind(),
            actor_id: entry.actor.id(),
            outcome: outcome_to_string(entry.outcome),
        }
    }
}

/// Statement appending every entry of `$events`; used inside a
/// transaction.
pub(crate) const APPEND_EVENTS: &str = "\
    FOR $e IN $events { \
        CREATE type::record('audit_log', $e.id) SET \
        user_id = $e.user_id, event_kind = $e.event_kind, \
        detail = $e.detail, actor_kind = $e.actor_kind, \
        actor_id = $e.actor_id, outcome = $e.outcome; \
    }; ";

fn parse_outcome(s: &str) -> Result<AuditOutcome, DbError> {
    match s {
        "Success" => Ok(AuditOutcome::Success),
        "Failure" => Ok(AuditOutcome::Failure),
        "Denied" => Ok(AuditOutcome::Denied),
        other => Err(DbError::Decode(format!("unknown audit outcome: {other}"))),
    }
}

fn outcome_to_string(o: AuditOutcome) -> &'static str {
    match o {
        AuditOutcome::Success => "Success",
        AuditOutcome::Failure => "Failure",
        AuditOutcome::Denied => "Denied",
    }
}

impl AuditRow {
    fn into_entry(self, id: Uuid) -> Result<AuditEntry, DbError> {
        AuditRowWithId {
            record_id: id.to_string(),
            user_id: self.user_id,
            event_kind: self.event_kind,
            detail: self.detail,
            actor_kind: self.actor_kind,
            actor_id: self.actor_id,
            outcome: self.outcome,
            timestamp: self.timestamp,
        }
        .try_into_entry()
    }
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditEntry, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(AuditEntry {
            id,
            user_id: self.user_id,
            event_kind: self
                .event_kind
                .parse::<AuditEventKind>()
                .map_err(DbError::Decode)?,
            detail: self.detail,
            actor: Actor::from_parts(&self.actor_kind, self.actor_id)
                .ok_or_else(|| DbError::Decode(format!("invalid actor: {}", self.actor_kind)))?,
            outcome: parse_outcome(&self.outcome)?,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditEntry) -> BantayResult<AuditEntry> {
        let id = Uuid::now_v7();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 user_id = $user_id, event_kind = $event_kind, \
                 detail = $detail, actor_kind = $actor_kind, \
                 actor_id = $actor_id, outcome = $outcome",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id))
            .bind(("event_kind", input.event_kind.as_str().to_string()))
            .bind(("detail", input.detail))
            .bind(("actor_kind", input.actor.kind().to_string()))
            .bind(("actor_id", input.actor.id()))
            .bind(("outcome", outcome_to_string(input.outcome).to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> BantayResult<PaginatedResult<AuditEntry>> {
        let mut conditions = Vec::new();
        if filter.user_id.is_some() {
            conditions.push("user_id = $user_id");
        }
        if filter.event_kind.is_some() {
            conditions.push("event_kind = $event_kind");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT count() AS total FROM audit_log {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log {where_clause} \
             ORDER BY id ASC LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(user_id) = filter.user_id {
            builder = builder.bind(("user_id", user_id));
        }
        if let Some(kind) = filter.event_kind {
            builder = builder.bind(("event_kind", kind.as_str().to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditRowWithId::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
