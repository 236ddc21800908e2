//! Integration tests for join request and managed group repositories.

use bantay_core::error::BantayError;
use bantay_core::models::join_request::JoinRequestStatus;
use bantay_core::models::managed_group::CreateManagedGroup;
use bantay_core::repository::{JoinRequestRepository, ManagedGroupRepository};
use bantay_db::repository::{SurrealJoinRequestRepository, SurrealManagedGroupRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    bantay_db::run_migrations(&db).await.unwrap();
    db
}

fn group(name: &str, link: &str) -> CreateManagedGroup {
    CreateManagedGroup {
        name: name.into(),
        description: format!("{name} chat"),
        link: link.into(),
    }
}

// -----------------------------------------------------------------------
// Join requests
// -----------------------------------------------------------------------

#[tokio::test]
async fn join_request_lifecycle() {
    let repo = SurrealJoinRequestRepository::new(setup().await);

    let request = repo.upsert_pending(1, -100).await.unwrap();
    assert_eq!(request.status, JoinRequestStatus::Pending);
    repo.upsert_pending(1, -200).await.unwrap();
    repo.upsert_pending(2, -100).await.unwrap();

    assert_eq!(repo.list_pending_for_user(1).await.unwrap().len(), 2);
    assert_eq!(repo.count_pending().await.unwrap(), 3);

    let approved = repo
        .set_status(1, -100, JoinRequestStatus::Approved)
        .await
        .unwrap();
    assert_eq!(approved.status, JoinRequestStatus::Approved);

    let pending: Vec<_> = repo
        .list_pending_for_user(1)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.chat_id)
        .collect();
    assert_eq!(pending, vec![-200]);
    assert_eq!(repo.count_pending().await.unwrap(), 2);
}

#[tokio::test]
async fn repeated_request_is_pending_again() {
    let repo = SurrealJoinRequestRepository::new(setup().await);
    repo.upsert_pending(1, -100).await.unwrap();
    repo.set_status(1, -100, JoinRequestStatus::Error)
        .await
        .unwrap();

    repo.upsert_pending(1, -100).await.unwrap();
    assert_eq!(repo.list_pending_for_user(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn set_status_of_unknown_request_is_not_found() {
    let repo = SurrealJoinRequestRepository::new(setup().await);
    let result = repo.set_status(9, -9, JoinRequestStatus::Approved).await;
    assert!(matches!(result, Err(BantayError::NotFound { .. })));
}

#[tokio::test]
async fn count_pending_on_empty_table_is_zero() {
    let repo = SurrealJoinRequestRepository::new(setup().await);
    assert_eq!(repo.count_pending().await.unwrap(), 0);
}

// -----------------------------------------------------------------------
// Managed groups
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_list_groups() {
    let repo = SurrealManagedGroupRepository::new(setup().await);

    let a = repo
        .create(group("Pinoy Devs", "https://t.me/pinoydevs"))
        .await
        .unwrap();
    assert_eq!(a.chat_id, None);
    repo.create(group("Kusina", "https://t.me/kusina"))
        .await
        .unwrap();

    let groups = repo.list().await.unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().any(|g| g.id == a.id && g.name == "Pinoy Devs"));
}

#[tokio::test]
async fn duplicate_link_is_rejected() {
    let repo = SurrealManagedGroupRepository::new(setup().await);
    repo.create(group("A", "https://t.me/a")).await.unwrap();

    let result = repo.create(group("B", "https://t.me/a")).await;
    assert!(matches!(result, Err(BantayError::AlreadyExists { .. })));
}

#[tokio::test]
async fn bind_chat_id_by_link() {
    let repo = SurrealManagedGroupRepository::new(setup().await);
    let created = repo.create(group("A", "https://t.me/a")).await.unwrap();

    let bound = repo.set_chat_id("https://t.me/a", -100777).await.unwrap();
    assert_eq!(bound.id, created.id);
    assert_eq!(bound.chat_id, Some(-100777));

    let missing = repo.set_chat_id("https://t.me/nope", -1).await;
    assert!(matches!(missing, Err(BantayError::NotFound { .. })));
}

#[tokio::test]
async fn delete_returns_the_removed_group() {
    let repo = SurrealManagedGroupRepository::new(setup().await);
    let created = repo.create(group("A", "https://t.me/a")).await.unwrap();

    let removed = repo.delete(created.id).await.unwrap();
    assert_eq!(removed.link, "https://t.me/a");
    assert!(repo.list().await.unwrap().is_empty());

    let again = repo.delete(Uuid::new_v4()).await;
    assert!(matches!(again, Err(BantayError::NotFound { .. })));
}
