//! Integration tests for the admin control surface.

use bantay_core::models::audit::{AuditEventKind, AuditOutcome};
use bantay_core::models::managed_group::CreateManagedGroup;
use bantay_core::models::user_record::{Actor, BanStatus, VerificationState, ViolationKind};
use bantay_core::repository::{AuditLogFilter, Pagination};
use bantay_db::repository::{
    SurrealAuditLogRepository, SurrealJoinRequestRepository, SurrealManagedGroupRepository,
    SurrealUserRecordRepository,
};
use bantay_moderation::language::prompt_for;
use bantay_moderation::{
    Authorizer, ContactPayload, GroupRegistry, ModerationConfig, ModerationError,
    ModerationService, ViolationOutcome,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

const ADMIN: i64 = 1000;
const MEMBER: i64 = 2000;

/// Treats every id above 999 as an admin except `MEMBER`.
struct FakeAuthorizer;

impl Authorizer for FakeAuthorizer {
    fn is_admin(&self, caller: i64) -> bool {
        caller > 999 && caller != MEMBER
    }
}

type Service = ModerationService<
    SurrealUserRecordRepository<Db>,
    SurrealAuditLogRepository<Db>,
    SurrealJoinRequestRepository<Db>,
    FakeAuthorizer,
>;

async fn setup() -> (Service, Surreal<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bantay_db::run_migrations(&db).await.unwrap();

    let service = ModerationService::new(
        SurrealUserRecordRepository::new(db.clone()),
        SurrealAuditLogRepository::new(db.clone()),
        SurrealJoinRequestRepository::new(db.clone()),
        FakeAuthorizer,
        ModerationConfig::default(),
    );
    (service, db)
}

async fn verify(service: &Service, user_id: i64) {
    service
        .submit_contact(
            user_id,
            &ContactPayload {
                owner_user_id: Some(user_id),
                phone_number: "+639171234567".into(),
            },
        )
        .await
        .unwrap();
    let prompt = prompt_for(&service.config().language_test, user_id).unwrap();
    let answer = prompt.accepted_keywords[..2].join(" ");
    service.submit_language_test(user_id, &answer).await.unwrap();
}

#[tokio::test]
async fn non_admins_are_refused_before_any_mutation() {
    let (service, _) = setup().await;
    verify(&service, 1).await;
    let before = service.status(1).await.unwrap();

    assert!(matches!(
        service.manual_ban(MEMBER, 1, "nope").await,
        Err(ModerationError::Unauthorized { caller: MEMBER })
    ));
    assert!(matches!(
        service.whitelist(MEMBER, 1).await,
        Err(ModerationError::Unauthorized { .. })
    ));
    assert!(matches!(
        service.unban(MEMBER, 1).await,
        Err(ModerationError::Unauthorized { .. })
    ));
    assert!(matches!(
        service.get_stats(MEMBER).await,
        Err(ModerationError::Unauthorized { .. })
    ));
    assert!(matches!(
        service.reset_verification(MEMBER, 1).await,
        Err(ModerationError::Unauthorized { .. })
    ));

    assert_eq!(service.status(1).await.unwrap(), before);
    assert!(matches!(
        service.status(MEMBER).await,
        Err(ModerationError::RecordNotFound(_))
    ));
}

#[tokio::test]
async fn manual_ban_ignores_strike_count() {
    let (service, _) = setup().await;
    verify(&service, 1).await;

    service.manual_ban(ADMIN, 1, "doxxing").await.unwrap();
    let record = service.status(1).await.unwrap();
    assert!(record.strikes.is_empty());
    assert_eq!(record.verification_state, VerificationState::Banned);
    let BanStatus::Banned(ban) = &record.ban_status else {
        panic!("expected Banned, got {:?}", record.ban_status);
    };
    assert_eq!(ban.reason, "doxxing");
    assert_eq!(ban.issued_by, Actor::Admin(ADMIN));

    assert!(matches!(
        service.manual_ban(ADMIN, 1, "   ").await,
        Err(ModerationError::Validation(_))
    ));
}

#[tokio::test]
async fn unban_restores_the_earned_state_and_keeps_strikes() {
    let (service, _) = setup().await;
    verify(&service, 1).await;
    for _ in 0..3 {
        service.report_violation(1, ViolationKind::Spam, "x").await.unwrap();
    }

    service.unban(ADMIN, 1).await.unwrap();
    let record = service.status(1).await.unwrap();
    assert_eq!(record.ban_status, BanStatus::NotBanned);
    assert_eq!(record.verification_state, VerificationState::Verified);
    assert_eq!(record.strikes.len(), 3);

    // Strikes are kept, so the next one is a new threshold crossing.
    let outcome = service
        .report_violation(1, ViolationKind::Spam, "x")
        .await
        .unwrap();
    assert!(matches!(outcome, ViolationOutcome::Banned { active: 4, .. }));
}

#[tokio::test]
async fn lifting_a_ban_restores_the_whitelist() {
    let (service, _) = setup().await;
    service.whitelist(ADMIN, 9).await.unwrap();
    service.whitelist(ADMIN, 10).await.unwrap();

    service.manual_ban(ADMIN, 9, "test").await.unwrap();
    assert_eq!(
        service.status(9).await.unwrap().verification_state,
        VerificationState::Banned
    );
    service.unban(ADMIN, 9).await.unwrap();
    let record = service.status(9).await.unwrap();
    assert_eq!(record.verification_state, VerificationState::Whitelisted);
    assert_eq!(record.whitelisted_by, Some(Actor::Admin(ADMIN)));
    assert!(matches!(
        service.report_violation(9, ViolationKind::Spam, "x").await,
        Err(ModerationError::Exempt)
    ));

    service.manual_ban(ADMIN, 10, "test").await.unwrap();
    service.file_appeal(10).await.unwrap();
    service.resolve_appeal(ADMIN, 10, true).await.unwrap();
    assert_eq!(
        service.status(10).await.unwrap().verification_state,
        VerificationState::Whitelisted
    );
}

#[tokio::test]
async fn reset_verification_drops_the_whitelist() {
    let (service, _) = setup().await;
    service.whitelist(ADMIN, 9).await.unwrap();
    service.reset_verification(ADMIN, 9).await.unwrap();

    let record = service.status(9).await.unwrap();
    assert_eq!(record.verification_state, VerificationState::Unverified);
    assert_eq!(record.whitelisted_by, None);
}

#[tokio::test]
async fn unban_of_a_user_who_is_not_banned_fails_without_mutation() {
    let (service, _) = setup().await;
    verify(&service, 1).await;
    let before = service.status(1).await.unwrap();

    assert!(matches!(
        service.unban(ADMIN, 1).await,
        Err(ModerationError::NotBanned)
    ));
    assert_eq!(service.status(1).await.unwrap(), before);

    let entries = service
        .audit_log(
            ADMIN,
            AuditLogFilter {
                user_id: Some(1),
                event_kind: Some(AuditEventKind::UserUnbanned),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(entries.total, 0);
}

#[tokio::test]
async fn resolving_appeals() {
    let (service, _) = setup().await;
    service.manual_ban(ADMIN, 1, "raid").await.unwrap();
    service.manual_ban(ADMIN, 2, "raid").await.unwrap();

    assert!(matches!(
        service.resolve_appeal(ADMIN, 1, true).await,
        Err(ModerationError::Validation(_))
    ));

    service.file_appeal(1).await.unwrap();
    service.file_appeal(2).await.unwrap();

    service.resolve_appeal(ADMIN, 1, true).await.unwrap();
    let approved = service.status(1).await.unwrap();
    assert_eq!(approved.ban_status, BanStatus::NotBanned);
    assert_eq!(approved.verification_state, VerificationState::Unverified);

    service.resolve_appeal(ADMIN, 2, false).await.unwrap();
    let denied = service.status(2).await.unwrap();
    assert!(matches!(denied.ban_status, BanStatus::Banned(_)));

    let log = service
        .audit_log(
            ADMIN,
            AuditLogFilter {
                user_id: Some(2),
                event_kind: Some(AuditEventKind::AppealDenied),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(log.total, 1);
    assert_eq!(log.items[0].outcome, AuditOutcome::Denied);
    assert_eq!(log.items[0].actor, Actor::Admin(ADMIN));
}

#[tokio::test]
async fn reset_strikes_and_verification() {
    let (service, _) = setup().await;
    verify(&service, 1).await;
    service.report_violation(1, ViolationKind::Spam, "x").await.unwrap();

    assert_eq!(service.reset_strikes(ADMIN, 1).await.unwrap(), 1);
    assert!(service.status(1).await.unwrap().strikes.is_empty());

    service.reset_verification(ADMIN, 1).await.unwrap();
    let record = service.status(1).await.unwrap();
    assert_eq!(record.verification_state, VerificationState::Unverified);
    assert_eq!(record.phone_number, None);
    assert_eq!(record.language_test, None);

    // A different phone may be bound after a reset.
    service
        .submit_contact(
            1,
            &ContactPayload {
                owner_user_id: Some(1),
                phone_number: "+639998887777".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        service.status(1).await.unwrap().phone_number.as_deref(),
        Some("+639998887777")
    );
}

#[tokio::test]
async fn admin_strikes_follow_the_threshold() {
    let (service, _) = setup().await;
    verify(&service, 1).await;

    service
        .issue_strike(ADMIN, 1, ViolationKind::OffensiveLanguage, "slur")
        .await
        .unwrap();
    let record = service.status(1).await.unwrap();
    assert_eq!(record.strikes[0].issued_by, Actor::Admin(ADMIN));

    assert!(matches!(
        service.issue_strike(MEMBER, 1, ViolationKind::Spam, "x").await,
        Err(ModerationError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn stats_count_states_bans_and_appeals() {
    let (service, _) = setup().await;
    verify(&service, 1).await;
    verify(&service, 2).await;
    service.whitelist(ADMIN, 3).await.unwrap();
    service.manual_ban(ADMIN, 4, "spam").await.unwrap();
    service.manual_ban(ADMIN, 5, "spam").await.unwrap();
    service.file_appeal(5).await.unwrap();
    service.handle_join_request(6, -100123).await.unwrap();

    let stats = service.get_stats(ADMIN).await.unwrap();
    assert_eq!(stats.counts.total, 5);
    assert_eq!(stats.in_state(VerificationState::Verified), 2);
    assert_eq!(stats.in_state(VerificationState::Whitelisted), 1);
    assert_eq!(stats.in_state(VerificationState::Banned), 2);
    assert_eq!(stats.counts.banned, 1);
    assert_eq!(stats.counts.appeals_pending, 1);
    assert_eq!(stats.total_bans(), 2);
    assert_eq!(stats.pending_join_requests, 1);
}

#[tokio::test]
async fn group_registry_is_admin_only_for_changes() {
    let (_, db) = setup().await;
    let registry = GroupRegistry::new(SurrealManagedGroupRepository::new(db), FakeAuthorizer);

    let input = CreateManagedGroup {
        name: "Pinoy Devs".into(),
        description: "Usapang code".into(),
        link: "https://t.me/pinoydevs".into(),
    };
    assert!(matches!(
        registry.add_group(MEMBER, input.clone()).await,
        Err(ModerationError::Unauthorized { .. })
    ));

    let group = registry.add_group(ADMIN, input.clone()).await.unwrap();
    assert!(matches!(
        registry.add_group(ADMIN, input).await,
        Err(ModerationError::Validation(_))
    ));

    assert!(registry.chat_ids().await.unwrap().is_empty());
    registry
        .bind_chat_id("https://t.me/pinoydevs", -100555)
        .await
        .unwrap();
    assert_eq!(registry.chat_ids().await.unwrap(), vec![-100555]);
    assert_eq!(registry.list_groups().await.unwrap().len(), 1);

    let removed = registry.remove_group(ADMIN, group.id).await.unwrap();
    assert_eq!(removed.name, "Pinoy Devs");
    assert!(registry.list_groups().await.unwrap().is_empty());
}
