//! Serialized read-modify-write access to user records.
//!
//! Every mutation of a user's record runs under that user's lock:
//! load (or lazily create), apply, then save the record together with
//! the audit events the mutation produced. Different users never wait
//! on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use bantay_core::models::audit::{AuditEventKind, AuditOutcome, CreateAuditEntry};
use bantay_core::models::user_record::{Actor, PlatformUserId, UserRecord};
use bantay_core::repository::{AuditLogRepository, UserRecordRepository};
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::error::ModerationResult;

/// One async mutex per user that currently has a caller inside it.
#[derive(Default)]
pub(crate) struct UserLocks {
    inner: Mutex<HashMap<PlatformUserId, Weak<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub(crate) async fn acquire(&self, user_id: PlatformUserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, weak| weak.strong_count() > 0);
            match map.get(&user_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    map.insert(user_id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

/// Working copy handed to a mutation closure.
pub(crate) struct Mutation {
    pub(crate) record: UserRecord,
    pub(crate) now: DateTime<Utc>,
    events: Vec<CreateAuditEntry>,
}

impl Mutation {
    /// Queue an audit event.
    ///
    /// Events are appended even when the closure returns an error, so a
    /// failing path may record rejected attempts (spoofing, malformed
    /// input) without changing the record.
    pub(crate) fn audit(
        &mut self,
        event_kind: AuditEventKind,
        actor: Actor,
        outcome: AuditOutcome,
        detail: impl Into<String>,
    ) {
        self.events.push(CreateAuditEntry {
            user_id: self.record.user_id,
            event_kind,
            detail: detail.into(),
            actor,
            outcome,
        });
    }

    /// Mark the user as active now.
    pub(crate) fn touch(&mut self) {
        self.record.last_activity_at = self.now;
    }
}

pub(crate) struct UserStore<U, L> {
    users: U,
    audit: L,
    locks: UserLocks,
}

impl<U: UserRecordRepository, L: AuditLogRepository> UserStore<U, L> {
    pub(crate) fn new(users: U, audit: L) -> Self {
        Self {
            users,
            audit,
            locks: UserLocks::default(),
        }
    }

    pub(crate) fn users(&self) -> &U {
        &self.users
    }

    pub(crate) fn audit_log(&self) -> &L {
        &self.audit
    }

    /// Unlocked read; may race with a concurrent writer.
    pub(crate) async fn read(&self, user_id: PlatformUserId) -> ModerationResult<Option<UserRecord>> {
        Ok(self.users.find(user_id).await?)
    }

    /// Apply `f` to the user's record under the user's lock.
    ///
    /// The record is created on first use. It is saved only when `f`
    /// succeeds and something changed; a brand-new record is saved
    /// only when `f` succeeds. A saved record and its audit events are
    /// written in one transaction. Events queued without a record
    /// change are appended on their own.
    pub(crate) async fn mutate<T, F>(&self, user_id: PlatformUserId, f: F) -> ModerationResult<T>
    where
        F: FnOnce(&mut Mutation) -> ModerationResult<T> + Send,
        T: Send,
    {
        let _guard = self.locks.acquire(user_id).await;

        let now = Utc::now();
        let existing = self.users.find(user_id).await?;
        let is_new = existing.is_none();
        let original = existing.unwrap_or_else(|| UserRecord::new(user_id, now));

        let mut mutation = Mutation {
            record: original.clone(),
            now,
            events: Vec::new(),
        };
        let result = f(&mut mutation);

        if result.is_ok() && (is_new || mutation.record != original) {
            self.users
                .save_with_audit(&mutation.record, &mutation.events)
                .await?;
            debug!(
                user_id,
                state = %mutation.record.verification_state,
                events = mutation.events.len(),
                "User record saved"
            );
        } else {
            for event in mutation.events {
                self.audit.append(event).await?;
            }
        }

        result
    }
}
