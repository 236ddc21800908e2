//! SurrealDB implementation of [`ManagedGroupRepository`].

use bantay_core::error::BantayResult;
use bantay_core::models::managed_group::{CreateManagedGroup, ManagedGroup};
use bantay_core::repository::ManagedGroupRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    description: String,
    link: String,
    chat_id: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    description: String,
    link: String,
    chat_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> ManagedGroup {
        ManagedGroup {
            id,
            name: self.name,
            description: self.description,
            link: self.link,
            chat_id: self.chat_id,
            created_at: self.created_at,
        }
    }
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<ManagedGroup, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(ManagedGroup {
            id,
            name: self.name,
            description: self.description,
            link: self.link,
            chat_id: self.chat_id,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the ManagedGroup repository.
#[derive(Clone)]
pub struct SurrealManagedGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealManagedGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ManagedGroupRepository for SurrealManagedGroupRepository<C> {
    async fn create(&self, input: CreateManagedGroup) -> BantayResult<ManagedGroup> {
        let mut existing = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM managed_group WHERE link = $link")
            .bind(("link", input.link.clone()))
            .await
            .map_err(DbError::from)?;
        let found: Vec<GroupRowWithId> = existing.take(0).map_err(DbError::from)?;
        if !found.is_empty() {
            return Err(DbError::AlreadyExists {
                entity: "managed_group".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('managed_group', $id) SET \
                 name = $name, description = $description, \
                 link = $link, chat_id = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("link", input.link))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "managed_group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id))
    }

    async fn delete(&self, id: Uuid) -> BantayResult<ManagedGroup> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("DELETE type::record('managed_group', $id) RETURN BEFORE")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "managed_group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id))
    }

    async fn list(&self) -> BantayResult<Vec<ManagedGroup>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM managed_group \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(GroupRowWithId::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(items)
    }

    async fn set_chat_id(&self, link: &str, chat_id: i64) -> BantayResult<ManagedGroup> {
        let mut result = self
            .db
            .query(
                "UPDATE managed_group SET chat_id = $chat_id WHERE link = $link; \
                 SELECT meta::id(id) AS record_id, * FROM managed_group \
                 WHERE link = $link",
            )
            .bind(("chat_id", chat_id))
            .bind(("link", link.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "managed_group".into(),
            id: format!("link={link}"),
        })?;

        Ok(row.try_into_group()?)
    }
}
