//! Privileged operations. Every call checks the caller first.

use bantay_core::models::audit::{AuditEntry, AuditEventKind, AuditOutcome};
use bantay_core::models::user_record::{
    Actor, BanDetails, BanStatus, PlatformUserId, UserRecord, VerificationState, ViolationKind,
};
use bantay_core::repository::{
    AuditLogFilter, AuditLogRepository, JoinRequestRepository, PaginatedResult, Pagination,
    UserRecordCounts, UserRecordRepository,
};
use tracing::info;

use crate::authz::{Authorizer, require_admin};
use crate::enforcement::ViolationOutcome;
use crate::error::{ModerationError, ModerationResult};
use crate::service::ModerationService;

/// Snapshot for `/stats`. May be slightly stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModerationStats {
    pub counts: UserRecordCounts,
    pub pending_join_requests: u64,
}

impl ModerationStats {
    pub fn in_state(&self, state: VerificationState) -> u64 {
        self.counts.by_state.get(&state).copied().unwrap_or(0)
    }

    /// Users with any active ban, appeals included.
    pub fn total_bans(&self) -> u64 {
        self.counts.banned + self.counts.appeals_pending
    }
}

fn lift_ban(record: &mut UserRecord) {
    record.ban_status = BanStatus::NotBanned;
    if record.verification_state == VerificationState::Banned {
        record.verification_state = record.earned_state();
    }
}

impl<U, L, J, Z> ModerationService<U, L, J, Z>
where
    U: UserRecordRepository,
    L: AuditLogRepository,
    J: JoinRequestRepository,
    Z: Authorizer,
{
    pub fn is_admin(&self, caller: PlatformUserId) -> bool {
        self.authorizer.is_admin(caller)
    }

    fn authorize(&self, caller: PlatformUserId, operation: &str) -> ModerationResult<()> {
        require_admin(&self.authorizer, caller, operation)
    }

    /// Exempt a user from verification and enforcement.
    ///
    /// Lifts any active ban. Strike history is kept. The whitelist
    /// outlives later bans: lifting one restores `Whitelisted`.
    pub async fn whitelist(&self, caller: PlatformUserId, user_id: PlatformUserId) -> ModerationResult<()> {
        self.authorize(caller, "whitelist")?;
        self.store
            .mutate(user_id, |m| {
                let previous = m.record.verification_state;
                m.record.verification_state = VerificationState::Whitelisted;
                m.record.whitelisted_by = Some(Actor::Admin(caller));
                m.record.ban_status = BanStatus::NotBanned;
                m.audit(
                    AuditEventKind::UserWhitelisted,
                    Actor::Admin(caller),
                    AuditOutcome::Success,
                    format!("whitelisted (was {previous})"),
                );
                Ok(())
            })
            .await?;

        info!(user_id, admin = caller, "User whitelisted");
        Ok(())
    }

    /// Ban a user regardless of their strike count.
    pub async fn manual_ban(
        &self,
        caller: PlatformUserId,
        user_id: PlatformUserId,
        reason: &str,
    ) -> ModerationResult<()> {
        self.authorize(caller, "ban")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ModerationError::Validation("ban reason must not be empty".into()));
        }

        self.store
            .mutate(user_id, |m| {
                m.record.ban_status = BanStatus::Banned(BanDetails {
                    reason: reason.to_string(),
                    banned_at: m.now,
                    issued_by: Actor::Admin(caller),
                });
                m.record.verification_state = VerificationState::Banned;
                m.audit(
                    AuditEventKind::UserBanned,
                    Actor::Admin(caller),
                    AuditOutcome::Success,
                    reason,
                );
                Ok(())
            })
            .await?;

        info!(user_id, admin = caller, reason, "User banned by admin");
        Ok(())
    }

    /// Lift a ban or a pending appeal. Strikes are kept.
    pub async fn unban(&self, caller: PlatformUserId, user_id: PlatformUserId) -> ModerationResult<()> {
        self.authorize(caller, "unban")?;
        self.store
            .mutate(user_id, |m| {
                if !m.record.is_banned() {
                    return Err(ModerationError::NotBanned);
                }
                lift_ban(&mut m.record);
                m.audit(
                    AuditEventKind::UserUnbanned,
                    Actor::Admin(caller),
                    AuditOutcome::Success,
                    format!("restored to {}", m.record.verification_state),
                );
                Ok(())
            })
            .await?;

        info!(user_id, admin = caller, "User unbanned");
        Ok(())
    }

    /// Approve (unban) or deny (keep banned) a pending appeal.
    pub async fn resolve_appeal(
        &self,
        caller: PlatformUserId,
        user_id: PlatformUserId,
        approve: bool,
    ) -> ModerationResult<()> {
        self.authorize(caller, "resolve appeal")?;
        self.store
            .mutate(user_id, |m| {
                let ban = match &m.record.ban_status {
                    BanStatus::NotBanned => return Err(ModerationError::NotBanned),
                    BanStatus::Banned(_) => {
                        return Err(ModerationError::Validation(
                            "no appeal is pending for this user".into(),
                        ));
                    }
                    BanStatus::AppealPending { ban, .. } => ban.clone(),
                };

                if approve {
                    lift_ban(&mut m.record);
                    m.audit(
                        AuditEventKind::UserUnbanned,
                        Actor::Admin(caller),
                        AuditOutcome::Success,
                        "appeal approved",
                    );
                } else {
                    m.record.ban_status = BanStatus::Banned(ban);
                    m.audit(
                        AuditEventKind::AppealDenied,
                        Actor::Admin(caller),
                        AuditOutcome::Denied,
                        "appeal denied",
                    );
                }
                Ok(())
            })
            .await?;

        info!(user_id, admin = caller, approve, "Appeal resolved");
        Ok(())
    }

    /// Clear a user's strike history. Does not lift a ban.
    pub async fn reset_strikes(&self, caller: PlatformUserId, user_id: PlatformUserId) -> ModerationResult<usize> {
        self.authorize(caller, "reset strikes")?;
        let cleared = self
            .store
            .mutate(user_id, |m| {
                let cleared = m.record.strikes.len();
                m.record.strikes.clear();
                m.audit(
                    AuditEventKind::StrikesReset,
                    Actor::Admin(caller),
                    AuditOutcome::Success,
                    format!("{cleared} strikes cleared"),
                );
                Ok(cleared)
            })
            .await?;

        info!(user_id, admin = caller, cleared, "Strikes reset");
        Ok(cleared)
    }

    /// Forget the bound phone, language result and whitelist so the user
    /// can verify again. A banned user stays banned.
    pub async fn reset_verification(
        &self,
        caller: PlatformUserId,
        user_id: PlatformUserId,
    ) -> ModerationResult<()> {
        self.authorize(caller, "reset verification")?;
        self.store
            .mutate(user_id, |m| {
                let previous = m.record.verification_state;
                m.record.phone_number = None;
                m.record.language_test = None;
                m.record.language_attempts = 0;
                m.record.whitelisted_by = None;
                if !m.record.is_banned() {
                    m.record.verification_state = VerificationState::Unverified;
                }
                m.audit(
                    AuditEventKind::VerificationReset,
                    Actor::Admin(caller),
                    AuditOutcome::Success,
                    format!("verification reset (was {previous})"),
                );
                Ok(())
            })
            .await?;

        info!(user_id, admin = caller, "Verification reset");
        Ok(())
    }

    /// Issue a strike by hand. Follows the same rules as reported
    /// violations, including the automatic ban.
    pub async fn issue_strike(
        &self,
        caller: PlatformUserId,
        user_id: PlatformUserId,
        kind: ViolationKind,
        evidence: &str,
    ) -> ModerationResult<ViolationOutcome> {
        self.authorize(caller, "strike")?;
        self.apply_violation(user_id, kind, evidence, Actor::Admin(caller))
            .await
    }

    /// Aggregate counts. Takes no per-user locks.
    pub async fn get_stats(&self, caller: PlatformUserId) -> ModerationResult<ModerationStats> {
        self.authorize(caller, "stats")?;
        Ok(ModerationStats {
            counts: self.store.users().counts().await?,
            pending_join_requests: self.join_requests.count_pending().await?,
        })
    }

    pub async fn audit_log(
        &self,
        caller: PlatformUserId,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> ModerationResult<PaginatedResult<AuditEntry>> {
        self.authorize(caller, "audit log")?;
        Ok(self.store.audit_log().list(filter, pagination).await?)
    }
}
