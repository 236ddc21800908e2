//! SurrealDB implementation of [`JoinRequestRepository`].

use bantay_core::error::BantayResult;
use bantay_core::models::join_request::{JoinRequest, JoinRequestStatus};
use bantay_core::models::user_record::PlatformUserId;
use bantay_core::repository::JoinRequestRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct JoinRequestRow {
    user_id: i64,
    chat_id: i64,
    status: String,
    requested_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(s: &str) -> Result<JoinRequestStatus, DbError> {
    match s {
        "Pending" => Ok(JoinRequestStatus::Pending),
        "Approved" => Ok(JoinRequestStatus::Approved),
        "Declined" => Ok(JoinRequestStatus::Declined),
        "Error" => Ok(JoinRequestStatus::Error),
        other => Err(DbError::Decode(format!("unknown join request status: {other}"))),
    }
}

fn status_to_string(s: JoinRequestStatus) -> &'static str {
    match s {
        JoinRequestStatus::Pending => "Pending",
        JoinRequestStatus::Approved => "Approved",
        JoinRequestStatus::Declined => "Declined",
        JoinRequestStatus::Error => "Error",
    }
}

fn record_key(user_id: PlatformUserId, chat_id: i64) -> String {
    format!("{user_id}_{chat_id}")
}

impl JoinRequestRow {
    fn try_into_request(self) -> Result<JoinRequest, DbError> {
        Ok(JoinRequest {
            user_id: self.user_id,
            chat_id: self.chat_id,
            status: parse_status(&self.status)?,
            requested_at: self.requested_at,
        })
    }
}

/// SurrealDB implementation of the JoinRequest repository.
#[derive(Clone)]
pub struct SurrealJoinRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealJoinRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> JoinRequestRepository for SurrealJoinRequestRepository<C> {
    async fn upsert_pending(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
    ) -> BantayResult<JoinRequest> {
        let key = record_key(user_id, chat_id);

        let result = self
            .db
            .query(
                "UPSERT type::record('join_request', $id) SET \
                 user_id = $user_id, chat_id = $chat_id, \
                 status = 'Pending', requested_at = time::now()",
            )
            .bind(("id", key.clone()))
            .bind(("user_id", user_id))
            .bind(("chat_id", chat_id))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<JoinRequestRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "join_request".into(),
            id: key,
        })?;

        Ok(row.try_into_request()?)
    }

    async fn set_status(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
        status: JoinRequestStatus,
    ) -> BantayResult<JoinRequest> {
        let key = record_key(user_id, chat_id);

        let mut result = self
            .db
            .query("UPDATE type::record('join_request', $id) SET status = $status")
            .bind(("id", key.clone()))
            .bind(("status", status_to_string(status).to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JoinRequestRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "join_request".into(),
            id: key,
        })?;

        Ok(row.try_into_request()?)
    }

    async fn list_pending_for_user(&self, user_id: PlatformUserId) -> BantayResult<Vec<JoinRequest>> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM join_request \
                 WHERE user_id = $user_id AND status = 'Pending' \
                 ORDER BY requested_at ASC",
            )
            .bind(("user_id", user_id))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<JoinRequestRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(JoinRequestRow::try_into_request)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn count_pending(&self) -> BantayResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM join_request \
                 WHERE status = 'Pending' GROUP ALL",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
