//! Verification flow: contact share, then the language check.
//!
//! `Unverified` -> `PhoneVerified` -> `Verified`, or `Rejected` after
//! too many failed language attempts. Rejected users may start over;
//! banned users may only appeal.

use bantay_core::models::audit::{AuditEventKind, AuditOutcome};
use bantay_core::models::user_record::{
    Actor, LanguageTestResult, PlatformUserId, VerificationState,
};
use bantay_core::repository::{AuditLogRepository, JoinRequestRepository, UserRecordRepository};
use tracing::{info, warn};

use crate::authz::Authorizer;
use crate::contact::{ContactPayload, is_own_contact};
use crate::error::{ModerationError, ModerationResult};
use crate::language;
use crate::phone;
use crate::service::{ModerationService, UserProfile};

/// What the user should be asked next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationPrompt {
    /// Ask the user to share their own contact card.
    RequestContact,
    /// Ask the language question.
    LanguageTest { question: String },
}

/// Result of a contact share that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    PhoneVerified {
        phone_number: String,
        next: VerificationPrompt,
    },
    /// Duplicate or late event; nothing changed.
    Unchanged { state: VerificationState },
}

/// Result of a language answer that did not end in rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageOutcome {
    Verified {
        /// Chats with open join requests to approve now.
        pending_chats: Vec<i64>,
    },
    Retry {
        attempts_left: u32,
        question: String,
    },
}

enum Graded {
    Passed,
    Failed { attempts_left: u32 },
    Rejected { attempts: u32 },
}

impl<U, L, J, Z> ModerationService<U, L, J, Z>
where
    U: UserRecordRepository,
    L: AuditLogRepository,
    J: JoinRequestRepository,
    Z: Authorizer,
{
    fn language_question(&self, user_id: PlatformUserId) -> ModerationResult<String> {
        language::prompt_for(&self.config.language_test, user_id)
            .map(|p| p.question.clone())
            .ok_or_else(|| ModerationError::Validation("no language prompts configured".into()))
    }

    /// Start (or resume) verification.
    pub async fn begin_verification(
        &self,
        user_id: PlatformUserId,
        profile: &UserProfile,
    ) -> ModerationResult<VerificationPrompt> {
        let state = self
            .store
            .mutate(user_id, |m| {
                profile.refresh(m);
                Ok(m.record.verification_state)
            })
            .await?;

        match state {
            VerificationState::Unverified | VerificationState::Rejected => {
                Ok(VerificationPrompt::RequestContact)
            }
            VerificationState::PhoneVerified | VerificationState::LanguagePassed => {
                Ok(VerificationPrompt::LanguageTest {
                    question: self.language_question(user_id)?,
                })
            }
            VerificationState::Verified | VerificationState::Whitelisted => {
                Err(ModerationError::AlreadyVerified)
            }
            VerificationState::Banned => Err(ModerationError::UserBanned),
        }
    }

    /// Handle a shared contact card.
    pub async fn submit_contact(
        &self,
        user_id: PlatformUserId,
        payload: &ContactPayload,
    ) -> ModerationResult<ContactOutcome> {
        let outcome = self
            .store
            .mutate(user_id, |m| {
                m.touch();

                if !is_own_contact(user_id, payload) {
                    m.audit(
                        AuditEventKind::ContactSpoofingDetected,
                        Actor::User(user_id),
                        AuditOutcome::Denied,
                        format!(
                            "contact owner {:?} submitted by {user_id}",
                            payload.owner_user_id
                        ),
                    );
                    return Err(ModerationError::ContactSpoofingDetected);
                }

                if m.record.is_banned() {
                    return Err(ModerationError::UserBanned);
                }

                let state = m.record.verification_state;
                if !matches!(
                    state,
                    VerificationState::Unverified | VerificationState::Rejected
                ) {
                    return Ok(ContactOutcome::Unchanged { state });
                }

                let number = match phone::normalize(&payload.phone_number) {
                    Ok(number) => number,
                    Err(e) => {
                        m.audit(
                            AuditEventKind::ContactRejected,
                            Actor::User(user_id),
                            AuditOutcome::Failure,
                            "phone number is not a Philippine number",
                        );
                        return Err(e);
                    }
                };

                if let Some(bound) = &m.record.phone_number {
                    if *bound != number {
                        return Err(ModerationError::PhoneAlreadyBound);
                    }
                }

                m.record.phone_number = Some(number.clone());
                m.record.verification_state = VerificationState::PhoneVerified;
                m.record.language_attempts = 0;
                m.audit(
                    AuditEventKind::ContactVerified,
                    Actor::User(user_id),
                    AuditOutcome::Success,
                    format!("phone {number} bound (was {state})"),
                );

                Ok(ContactOutcome::PhoneVerified {
                    phone_number: number,
                    next: VerificationPrompt::RequestContact,
                })
            })
            .await;

        match outcome {
            Ok(ContactOutcome::PhoneVerified { phone_number, .. }) => {
                info!(user_id, "Phone number verified");
                Ok(ContactOutcome::PhoneVerified {
                    phone_number,
                    next: VerificationPrompt::LanguageTest {
                        question: self.language_question(user_id)?,
                    },
                })
            }
            Err(ModerationError::ContactSpoofingDetected) => {
                warn!(
                    user_id,
                    owner = ?payload.owner_user_id,
                    "Contact spoofing attempt rejected"
                );
                Err(ModerationError::ContactSpoofingDetected)
            }
            other => other,
        }
    }

    /// Grade a language test answer.
    ///
    /// Returns `MaxAttemptsExceeded` once the failure that uses up the
    /// last attempt has moved the user to `Rejected`.
    pub async fn submit_language_test(
        &self,
        user_id: PlatformUserId,
        answer_text: &str,
    ) -> ModerationResult<LanguageOutcome> {
        let prompt = language::prompt_for(&self.config.language_test, user_id)
            .ok_or_else(|| ModerationError::Validation("no language prompts configured".into()))?;
        let min_hits = self.config.language_test.min_keyword_hits;
        let max_attempts = self.config.max_language_attempts;

        let graded = self
            .store
            .mutate(user_id, |m| {
                m.touch();

                if m.record.is_banned() {
                    return Err(ModerationError::UserBanned);
                }
                match m.record.verification_state {
                    VerificationState::PhoneVerified | VerificationState::LanguagePassed => {}
                    VerificationState::Verified | VerificationState::Whitelisted => {
                        return Err(ModerationError::AlreadyVerified);
                    }
                    state => {
                        return Err(ModerationError::InvalidState {
                            operation: "language test",
                            state,
                        });
                    }
                }

                let score = language::score(prompt, answer_text, min_hits);
                m.record.language_test = Some(LanguageTestResult {
                    passed: score.passed,
                    taken_at: m.now,
                });

                if score.passed {
                    // LanguagePassed is transient: passing admits the user.
                    m.record.verification_state = VerificationState::Verified;
                    m.audit(
                        AuditEventKind::LanguageTestPassed,
                        Actor::User(user_id),
                        AuditOutcome::Success,
                        format!("{} keyword hits", score.hits),
                    );
                    return Ok(Graded::Passed);
                }

                m.record.language_attempts += 1;
                let attempts = m.record.language_attempts;
                m.audit(
                    AuditEventKind::LanguageTestFailed,
                    Actor::User(user_id),
                    AuditOutcome::Failure,
                    format!("attempt {attempts}/{max_attempts}, {} keyword hits", score.hits),
                );

                if attempts >= max_attempts {
                    m.record.verification_state = VerificationState::Rejected;
                    m.audit(
                        AuditEventKind::VerificationRejected,
                        Actor::System,
                        AuditOutcome::Failure,
                        format!("language test failed {attempts} times"),
                    );
                    Ok(Graded::Rejected { attempts })
                } else {
                    Ok(Graded::Failed {
                        attempts_left: max_attempts - attempts,
                    })
                }
            })
            .await?;

        match graded {
            Graded::Passed => {
                info!(user_id, "User verified");
                Ok(LanguageOutcome::Verified {
                    pending_chats: self.pending_join_requests(user_id).await?,
                })
            }
            Graded::Failed { attempts_left } => Ok(LanguageOutcome::Retry {
                attempts_left,
                question: prompt.question.clone(),
            }),
            Graded::Rejected { attempts } => {
                info!(user_id, attempts, "Verification rejected");
                Err(ModerationError::MaxAttemptsExceeded { attempts })
            }
        }
    }
}
