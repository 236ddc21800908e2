//! Moderation service: shared state and user-facing queries.
//!
//! The verification flow, enforcement engine and admin surface are
//! implemented as separate `impl` blocks in their own modules.

use bantay_core::models::join_request::JoinRequestStatus;
use bantay_core::models::user_record::{PlatformUserId, UserRecord};
use bantay_core::repository::{AuditLogRepository, JoinRequestRepository, UserRecordRepository};
use serde::Deserialize;
use tracing::{info, warn};

use crate::authz::Authorizer;
use crate::config::ModerationConfig;
use crate::error::{ModerationError, ModerationResult};
use crate::store::{Mutation, UserStore};

/// Display details the platform sends with every event.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl UserProfile {
    /// Mark the user as seen and copy over the details that were sent.
    pub(crate) fn refresh(&self, m: &mut Mutation) {
        m.touch();
        if self.username.is_some() {
            m.record.username.clone_from(&self.username);
        }
        if self.first_name.is_some() {
            m.record.first_name.clone_from(&self.first_name);
        }
    }
}

/// What the glue layer should do with a group join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// Approve on the platform, then report back with
    /// [`ModerationService::mark_join_request`].
    Approve,
    Decline,
    /// Leave the request open and prompt the user to verify.
    AwaitVerification,
}

/// Verification, enforcement and admin operations over one store.
///
/// Generic over repository and authorizer implementations so that the
/// moderation layer has no dependency on the database crate.
pub struct ModerationService<U, L, J, Z> {
    pub(crate) store: UserStore<U, L>,
    pub(crate) join_requests: J,
    pub(crate) authorizer: Z,
    pub(crate) config: ModerationConfig,
}

impl<U, L, J, Z> ModerationService<U, L, J, Z>
where
    U: UserRecordRepository,
    L: AuditLogRepository,
    J: JoinRequestRepository,
    Z: Authorizer,
{
    pub fn new(
        user_repo: U,
        audit_repo: L,
        join_request_repo: J,
        authorizer: Z,
        config: ModerationConfig,
    ) -> Self {
        Self {
            store: UserStore::new(user_repo, audit_repo),
            join_requests: join_request_repo,
            authorizer,
            config,
        }
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Current record of a user, for `/status`.
    ///
    /// Never creates a record; unknown users get `RecordNotFound`.
    pub async fn status(&self, user_id: PlatformUserId) -> ModerationResult<UserRecord> {
        self.store
            .read(user_id)
            .await?
            .ok_or_else(|| ModerationError::RecordNotFound(format!("user {user_id}")))
    }

    /// Record that the user was seen, refreshing display details.
    pub async fn touch(&self, user_id: PlatformUserId, profile: &UserProfile) -> ModerationResult<()> {
        self.store
            .mutate(user_id, |m| {
                profile.refresh(m);
                Ok(())
            })
            .await
    }

    /// Record a join request and decide what to do with it.
    pub async fn handle_join_request(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
    ) -> ModerationResult<JoinDecision> {
        self.join_requests.upsert_pending(user_id, chat_id).await?;

        let record = self.store.read(user_id).await?;
        let decision = match record {
            Some(r) if r.is_banned() => {
                self.join_requests
                    .set_status(user_id, chat_id, JoinRequestStatus::Declined)
                    .await?;
                JoinDecision::Decline
            }
            Some(r) if r.verification_state.is_admitted() => JoinDecision::Approve,
            _ => JoinDecision::AwaitVerification,
        };

        info!(user_id, chat_id, ?decision, "Join request received");
        Ok(decision)
    }

    /// Report the platform outcome of an approval.
    pub async fn mark_join_request(
        &self,
        user_id: PlatformUserId,
        chat_id: i64,
        status: JoinRequestStatus,
    ) -> ModerationResult<()> {
        if status == JoinRequestStatus::Error {
            warn!(user_id, chat_id, "Join request approval failed on the platform");
        }
        self.join_requests
            .set_status(user_id, chat_id, status)
            .await?;
        Ok(())
    }

    /// Chats the user asked to join while unverified.
    pub async fn pending_join_requests(&self, user_id: PlatformUserId) -> ModerationResult<Vec<i64>> {
        Ok(self
            .join_requests
            .list_pending_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.chat_id)
            .collect())
    }
}
