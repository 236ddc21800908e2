//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! Platform ids are stored as ints, generated ids as strings. Enums
//! are stored as strings with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- User records (one per platform user, never deleted)
-- =======================================================================
DEFINE TABLE user_record SCHEMAFULL;
DEFINE FIELD user_id ON TABLE user_record TYPE int;
DEFINE FIELD username ON TABLE user_record TYPE option<string>;
DEFINE FIELD first_name ON TABLE user_record TYPE option<string>;
DEFINE FIELD verification_state ON TABLE user_record TYPE string \
    ASSERT $value IN ['Unverified', 'PhoneVerified', 'LanguagePassed', \
    'Verified', 'Rejected', 'Banned', 'Whitelisted'];
DEFINE FIELD phone_number ON TABLE user_record TYPE option<string>;
DEFINE FIELD language_passed ON TABLE user_record TYPE option<bool>;
DEFINE FIELD language_tested_at ON TABLE user_record \
    TYPE option<datetime>;
DEFINE FIELD language_attempts ON TABLE user_record TYPE int DEFAULT 0;
DEFINE FIELD ban_kind ON TABLE user_record TYPE string \
    ASSERT $value IN ['NotBanned', 'Banned', 'AppealPending'];
DEFINE FIELD ban_reason ON TABLE user_record TYPE option<string>;
DEFINE FIELD banned_at ON TABLE user_record TYPE option<datetime>;
DEFINE FIELD banned_by_kind ON TABLE user_record TYPE option<string>;
DEFINE FIELD banned_by_id ON TABLE user_record TYPE option<int>;
DEFINE FIELD appealed_at ON TABLE user_record TYPE option<datetime>;
DEFINE FIELD whitelisted_by_kind ON TABLE user_record TYPE option<string>;
DEFINE FIELD whitelisted_by_id ON TABLE user_record TYPE option<int>;
DEFINE FIELD joined_at ON TABLE user_record TYPE datetime;
DEFINE FIELD last_activity_at ON TABLE user_record TYPE datetime;
DEFINE INDEX idx_user_record_user ON TABLE user_record \
    COLUMNS user_id UNIQUE;
DEFINE INDEX idx_user_record_state ON TABLE user_record \
    COLUMNS verification_state;

-- =======================================================================
-- Strikes (ordered per user by seq)
-- =======================================================================
DEFINE TABLE strike SCHEMAFULL;
DEFINE FIELD user_id ON TABLE strike TYPE int;
DEFINE FIELD seq ON TABLE strike TYPE int;
DEFINE FIELD reason ON TABLE strike TYPE string;
DEFINE FIELD kind ON TABLE strike TYPE string;
DEFINE FIELD evidence ON TABLE strike TYPE string;
DEFINE FIELD issued_at ON TABLE strike TYPE datetime;
DEFINE FIELD issued_by_kind ON TABLE strike TYPE string \
    ASSERT $value IN ['System', 'User', 'Admin'];
DEFINE FIELD issued_by_id ON TABLE strike TYPE option<int>;
DEFINE INDEX idx_strike_user_seq ON TABLE strike \
    COLUMNS user_id, seq UNIQUE;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD user_id ON TABLE audit_log TYPE int;
DEFINE FIELD event_kind ON TABLE audit_log TYPE string;
DEFINE FIELD detail ON TABLE audit_log TYPE string;
DEFINE FIELD actor_kind ON TABLE audit_log TYPE string \
    ASSERT $value IN ['System', 'User', 'Admin'];
DEFINE FIELD actor_id ON TABLE audit_log TYPE option<int>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_user ON TABLE audit_log COLUMNS user_id;
DEFINE INDEX idx_audit_kind ON TABLE audit_log COLUMNS event_kind;

-- =======================================================================
-- Join requests (keyed by user and chat)
-- =======================================================================
DEFINE TABLE join_request SCHEMAFULL;
DEFINE FIELD user_id ON TABLE join_request TYPE int;
DEFINE FIELD chat_id ON TABLE join_request TYPE int;
DEFINE FIELD status ON TABLE join_request TYPE string \
    ASSERT $value IN ['Pending', 'Approved', 'Declined', 'Error'];
DEFINE FIELD requested_at ON TABLE join_request TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_join_request_user_chat ON TABLE join_request \
    COLUMNS user_id, chat_id UNIQUE;

-- =======================================================================
-- Managed groups
-- =======================================================================
DEFINE TABLE managed_group SCHEMAFULL;
DEFINE FIELD name ON TABLE managed_group TYPE string;
DEFINE FIELD description ON TABLE managed_group TYPE string;
DEFINE FIELD link ON TABLE managed_group TYPE string;
DEFINE FIELD chat_id ON TABLE managed_group TYPE option<int>;
DEFINE FIELD created_at ON TABLE managed_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_managed_group_link ON TABLE managed_group \
    COLUMNS link UNIQUE;
";

/// Run all pending migrations against the given SurrealDB instance.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_every_table() {
        for table in [
            "user_record",
            "strike",
            "audit_log",
            "join_request",
            "managed_group",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} SCHEMAFULL")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
