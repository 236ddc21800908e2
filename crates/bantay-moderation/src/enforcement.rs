//! Strike accounting, automatic bans and appeals.

use bantay_core::models::audit::{AuditEventKind, AuditOutcome};
use bantay_core::models::user_record::{
    Actor, BanDetails, BanStatus, PlatformUserId, Strike, VerificationState, ViolationKind,
};
use bantay_core::repository::{AuditLogRepository, JoinRequestRepository, UserRecordRepository};
use tracing::info;

use crate::authz::Authorizer;
use crate::error::{ModerationError, ModerationResult};
use crate::service::ModerationService;

/// Result of a reported violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationOutcome {
    /// Strike recorded, threshold not reached.
    StrikeRecorded { active: usize, threshold: u32 },
    /// This strike crossed the threshold and banned the user.
    Banned { reason: String, active: usize },
    /// The user was already banned; nothing was recorded.
    AlreadyBanned,
}

impl<U, L, J, Z> ModerationService<U, L, J, Z>
where
    U: UserRecordRepository,
    L: AuditLogRepository,
    J: JoinRequestRepository,
    Z: Authorizer,
{
    /// Record a violation detected by the platform.
    pub async fn report_violation(
        &self,
        user_id: PlatformUserId,
        kind: ViolationKind,
        evidence: &str,
    ) -> ModerationResult<ViolationOutcome> {
        self.apply_violation(user_id, kind, evidence, Actor::System)
            .await
    }

    pub(crate) async fn apply_violation(
        &self,
        user_id: PlatformUserId,
        kind: ViolationKind,
        evidence: &str,
        issued_by: Actor,
    ) -> ModerationResult<ViolationOutcome> {
        let threshold = self.config.strike_threshold;
        let ttl = self.config.strike_ttl();

        let outcome = self
            .store
            .mutate(user_id, |m| {
                if m.record.is_banned() {
                    return Ok(ViolationOutcome::AlreadyBanned);
                }
                match m.record.verification_state {
                    VerificationState::Verified => {}
                    VerificationState::Whitelisted => return Err(ModerationError::Exempt),
                    state => {
                        return Err(ModerationError::InvalidState {
                            operation: "strike",
                            state,
                        });
                    }
                }

                m.record.strikes.push(Strike {
                    reason: kind.describe().to_string(),
                    kind,
                    evidence: evidence.to_string(),
                    issued_at: m.now,
                    issued_by,
                });
                let active = m.record.active_strikes(m.now, ttl);
                m.audit(
                    AuditEventKind::StrikeIssued,
                    issued_by,
                    AuditOutcome::Success,
                    format!("{} ({active}/{threshold})", kind.describe()),
                );

                if active < threshold as usize {
                    return Ok(ViolationOutcome::StrikeRecorded { active, threshold });
                }

                let reasons: Vec<&str> = m
                    .record
                    .strikes
                    .iter()
                    .filter(|s| s.is_active(m.now, ttl))
                    .map(|s| s.reason.as_str())
                    .collect();
                let reason = reasons.join("; ");

                m.record.ban_status = BanStatus::Banned(BanDetails {
                    reason: reason.clone(),
                    banned_at: m.now,
                    issued_by: Actor::System,
                });
                m.record.verification_state = VerificationState::Banned;
                m.audit(
                    AuditEventKind::UserBanned,
                    Actor::System,
                    AuditOutcome::Success,
                    format!("strike threshold reached: {reason}"),
                );
                Ok(ViolationOutcome::Banned { reason, active })
            })
            .await?;

        match &outcome {
            ViolationOutcome::StrikeRecorded { active, threshold } => {
                info!(user_id, kind = kind.as_str(), active, threshold, "Strike recorded");
            }
            ViolationOutcome::Banned { active, .. } => {
                info!(user_id, kind = kind.as_str(), active, "User banned at strike threshold");
            }
            ViolationOutcome::AlreadyBanned => {}
        }
        Ok(outcome)
    }

    /// Whether the user is currently banned. Unknown users are not.
    pub async fn is_banned(&self, user_id: PlatformUserId) -> ModerationResult<bool> {
        Ok(self
            .store
            .read(user_id)
            .await?
            .is_some_and(|r| r.is_banned()))
    }

    /// Ask an admin to review the user's ban.
    pub async fn file_appeal(&self, user_id: PlatformUserId) -> ModerationResult<()> {
        self.store
            .mutate(user_id, |m| {
                m.touch();
                let ban = match &m.record.ban_status {
                    BanStatus::NotBanned => return Err(ModerationError::NotBanned),
                    BanStatus::AppealPending { .. } => {
                        return Err(ModerationError::AppealAlreadyPending);
                    }
                    BanStatus::Banned(ban) => ban.clone(),
                };
                m.record.ban_status = BanStatus::AppealPending {
                    ban,
                    appealed_at: m.now,
                };
                m.audit(
                    AuditEventKind::AppealFiled,
                    Actor::User(user_id),
                    AuditOutcome::Success,
                    "appeal filed",
                );
                Ok(())
            })
            .await?;

        info!(user_id, "Appeal filed");
        Ok(())
    }
}
