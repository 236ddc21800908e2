//! Integration tests for the user record repository using in-memory
//! SurrealDB.

use bantay_core::error::BantayError;
use bantay_core::models::user_record::{
    Actor, BanDetails, BanStatus, LanguageTestResult, Strike, UserRecord, VerificationState,
    ViolationKind,
};
use bantay_core::models::audit::{AuditEventKind, AuditOutcome, CreateAuditEntry};
use bantay_core::repository::{
    AuditLogFilter, AuditLogRepository, Pagination, UserRecordRepository,
};
use bantay_db::repository::{SurrealAuditLogRepository, SurrealUserRecordRepository};
use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> SurrealUserRecordRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bantay_db::run_migrations(&db).await.unwrap();
    SurrealUserRecordRepository::new(db)
}

fn strike(kind: ViolationKind, issued_by: Actor) -> Strike {
    Strike {
        reason: kind.describe().into(),
        kind,
        evidence: "evidence".into(),
        issued_at: Utc::now(),
        issued_by,
    }
}

#[tokio::test]
async fn unknown_user_is_absent() {
    let repo = setup().await;
    assert!(repo.find(42).await.unwrap().is_none());
    assert!(matches!(
        repo.get(42).await,
        Err(BantayError::NotFound { .. })
    ));
}

#[tokio::test]
async fn save_and_find_round_trips_a_full_record() {
    let repo = setup().await;
    let now = Utc::now();

    let mut record = UserRecord::new(7, now - Duration::days(2));
    record.username = Some("maria".into());
    record.first_name = Some("Maria".into());
    record.phone_number = Some("+639171234567".into());
    record.language_test = Some(LanguageTestResult {
        passed: true,
        taken_at: now - Duration::days(1),
    });
    record.language_attempts = 1;
    record.strikes = vec![
        strike(ViolationKind::Spam, Actor::System),
        strike(ViolationKind::Flooding, Actor::Admin(1000)),
    ];
    record.verification_state = VerificationState::Banned;
    record.ban_status = BanStatus::AppealPending {
        ban: BanDetails {
            reason: "spam; message flooding".into(),
            banned_at: now,
            issued_by: Actor::System,
        },
        appealed_at: now,
    };
    record.whitelisted_by = Some(Actor::Admin(1000));
    record.last_activity_at = now;

    repo.save(&record).await.unwrap();
    let loaded = repo.get(7).await.unwrap();
    assert_eq!(loaded, record);
}

fn ban_event(user_id: i64, detail: &str) -> CreateAuditEntry {
    CreateAuditEntry {
        user_id,
        event_kind: AuditEventKind::UserBanned,
        detail: detail.into(),
        actor: Actor::System,
        outcome: AuditOutcome::Success,
    }
}

async fn setup_with_audit() -> (
    Surreal<Db>,
    SurrealUserRecordRepository<Db>,
    SurrealAuditLogRepository<Db>,
) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bantay_db::run_migrations(&db).await.unwrap();
    (
        db.clone(),
        SurrealUserRecordRepository::new(db.clone()),
        SurrealAuditLogRepository::new(db),
    )
}

#[tokio::test]
async fn save_with_audit_writes_record_and_events_together() {
    let (_db, repo, audit) = setup_with_audit().await;
    let mut record = UserRecord::new(7, Utc::now());
    record.verification_state = VerificationState::Verified;

    repo.save_with_audit(&record, &[ban_event(7, "first"), ban_event(7, "second")])
        .await
        .unwrap();

    assert_eq!(repo.get(7).await.unwrap(), record);
    let entries = audit
        .list(
            AuditLogFilter {
                user_id: Some(7),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    let details: Vec<_> = entries.items.iter().map(|e| e.detail.as_str()).collect();
    assert_eq!(details, ["first", "second"]);
}

#[tokio::test]
async fn failed_audit_write_rolls_back_the_record() {
    let (db, repo, audit) = setup_with_audit().await;
    db.query(
        "DEFINE FIELD OVERWRITE detail ON TABLE audit_log TYPE string \
         ASSERT $value != 'rejected'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let mut record = UserRecord::new(7, Utc::now());
    record.verification_state = VerificationState::Verified;
    repo.save(&record).await.unwrap();

    let mut banned = record.clone();
    banned.verification_state = VerificationState::Banned;
    banned.ban_status = BanStatus::Banned(BanDetails {
        reason: "spam".into(),
        banned_at: Utc::now(),
        issued_by: Actor::System,
    });
    let result = repo
        .save_with_audit(&banned, &[ban_event(7, "ok"), ban_event(7, "rejected")])
        .await;
    assert!(matches!(result, Err(BantayError::Database(_))));

    assert_eq!(repo.get(7).await.unwrap(), record);
    let entries = audit
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(entries.total, 0);
}

#[tokio::test]
async fn save_replaces_strikes() {
    let repo = setup().await;
    let mut record = UserRecord::new(7, Utc::now());
    record.verification_state = VerificationState::Verified;
    record.strikes = vec![
        strike(ViolationKind::Spam, Actor::System),
        strike(ViolationKind::Advertising, Actor::System),
    ];
    repo.save(&record).await.unwrap();

    record.strikes.clear();
    repo.save(&record).await.unwrap();
    assert!(repo.get(7).await.unwrap().strikes.is_empty());

    record.strikes.push(strike(ViolationKind::Other, Actor::Admin(1)));
    repo.save(&record).await.unwrap();
    let loaded = repo.get(7).await.unwrap();
    assert_eq!(loaded.strikes.len(), 1);
    assert_eq!(loaded.strikes[0].kind, ViolationKind::Other);
}

#[tokio::test]
async fn strikes_keep_their_order() {
    let repo = setup().await;
    let mut record = UserRecord::new(7, Utc::now());
    record.verification_state = VerificationState::Verified;
    for kind in ViolationKind::ALL {
        record.strikes.push(strike(kind, Actor::System));
    }
    repo.save(&record).await.unwrap();

    let kinds: Vec<_> = repo
        .get(7)
        .await
        .unwrap()
        .strikes
        .into_iter()
        .map(|s| s.kind)
        .collect();
    assert_eq!(kinds, ViolationKind::ALL.to_vec());
}

#[tokio::test]
async fn records_are_isolated_per_user() {
    let repo = setup().await;
    let mut a = UserRecord::new(1, Utc::now());
    a.verification_state = VerificationState::Verified;
    a.strikes.push(strike(ViolationKind::Spam, Actor::System));
    let b = UserRecord::new(2, Utc::now());
    repo.save(&a).await.unwrap();
    repo.save(&b).await.unwrap();

    assert_eq!(repo.get(1).await.unwrap().strikes.len(), 1);
    assert!(repo.get(2).await.unwrap().strikes.is_empty());
}

#[tokio::test]
async fn counts_group_by_state_and_ban() {
    let repo = setup().await;
    let now = Utc::now();
    let ban = BanDetails {
        reason: "spam".into(),
        banned_at: now,
        issued_by: Actor::System,
    };

    let mut verified = UserRecord::new(1, now);
    verified.verification_state = VerificationState::Verified;
    let unverified = UserRecord::new(2, now);
    let mut banned = UserRecord::new(3, now);
    banned.verification_state = VerificationState::Banned;
    banned.ban_status = BanStatus::Banned(ban.clone());
    let mut appealing = UserRecord::new(4, now);
    appealing.verification_state = VerificationState::Banned;
    appealing.ban_status = BanStatus::AppealPending {
        ban,
        appealed_at: now,
    };

    for record in [&verified, &unverified, &banned, &appealing] {
        repo.save(record).await.unwrap();
    }

    let counts = repo.counts().await.unwrap();
    assert_eq!(counts.total, 4);
    assert_eq!(counts.by_state.get(&VerificationState::Verified), Some(&1));
    assert_eq!(counts.by_state.get(&VerificationState::Unverified), Some(&1));
    assert_eq!(counts.by_state.get(&VerificationState::Banned), Some(&2));
    assert_eq!(counts.banned, 1);
    assert_eq!(counts.appeals_pending, 1);
}

#[tokio::test]
async fn counts_on_an_empty_store_are_zero() {
    let repo = setup().await;
    let counts = repo.counts().await.unwrap();
    assert_eq!(counts.total, 0);
    assert!(counts.by_state.is_empty());
}
