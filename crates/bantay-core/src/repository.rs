//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Serializing concurrent writes
//! to the same user is the caller's job; repositories only promise that
//! a single `save` is applied atomically.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::BantayResult;
use crate::models::{
    audit::{AuditEntry, AuditEventKind, CreateAuditEntry},
    join_request::{JoinRequest, JoinRequestStatus},
    managed_group::{CreateManagedGroup, ManagedGroup},
    user_record::{PlatformUserId, UserRecord, VerificationState},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// User records
// ---------------------------------------------------------------------------

/// Aggregate counts over every stored user record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecordCounts {
    pub by_state: BTreeMap<VerificationState, u64>,
    pub total: u64,
    /// Users whose ban status is `Banned`.
    pub banned: u64,
    /// Users whose ban status is `AppealPending`.
    pub appeals_pending: u64,
}

pub trait UserRecordRepository: Send + Sync {
    /// Load a record, or `None` if the user has never interacted.
    fn find(
        &self,
        user_id: PlatformUserId,
    ) -> impl Future<Output = BantayResult<Option<UserRecord>>> + Send;
    /// Load a record, failing with `NotFound` if it does not exist.
    fn get(&self, user_id: PlatformUserId) -> impl Future<Output = BantayResult<UserRecord>> + Send;
    /// Insert or replace the whole record, strikes included.
    fn save(&self, record: &UserRecord) -> impl Future<Output = BantayResult<()>> + Send {
        self.save_with_audit(record, &[])
    }
    /// Save the record and append `events` to the audit log atomically:
    /// either both are written or neither is.
    fn save_with_audit(
        &self,
        record: &UserRecord,
        events: &[CreateAuditEntry],
    ) -> impl Future<Output = BantayResult<()>> + Send;
    fn counts(&self) -> impl Future<Output = BantayResult<UserRecordCounts>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub user_id: Option<PlatformUserId>,
    pub event_kind: Option<AuditEventKind>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditEntry,
    ) -> impl Future<Output = BantayResult<AuditEntry>> + Send;
    /// List entries in insertion order.
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = BantayResult<PaginatedResult<AuditEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Join requests & managed groups
// ---------------------------------------------------------------------------

pub trait JoinRequestRepository: Send + Sync {
    /// Record a request, resetting it to `Pending` if it already exists.
    fn upsert_pending(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
    ) -> impl Future<Output = BantayResult<JoinRequest>> + Send;
    fn set_status(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
        status: JoinRequestStatus,
    ) -> impl Future<Output = BantayResult<JoinRequest>> + Send;
    fn list_pending_for_user(
        &self,
        user_id: PlatformUserId,
    ) -> impl Future<Output = BantayResult<Vec<JoinRequest>>> + Send;
    fn count_pending(&self) -> impl Future<Output = BantayResult<u64>> + Send;
}

pub trait ManagedGroupRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the link is already registered.
    fn create(
        &self,
        input: CreateManagedGroup,
    ) -> impl Future<Output = BantayResult<ManagedGroup>> + Send;
    /// Remove a group and return what was removed.
    fn delete(&self, id: Uuid) -> impl Future<Output = BantayResult<ManagedGroup>> + Send;
    fn list(&self) -> impl Future<Output = BantayResult<Vec<ManagedGroup>>> + Send;
    /// Attach a platform chat id to the group registered under `link`.
    fn set_chat_id(
        &self,
        link: &str,
        chat_id: i64,
    ) -> impl Future<Output = BantayResult<ManagedGroup>> + Send;
}
