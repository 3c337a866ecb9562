//! Nickname repository
//!
//! Database operations for the `nicknames` table. Every write is a single
//! statement, so concurrent updates for one participant cannot interleave.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::debug;

use super::{DisplayName, validate_nickname};
use crate::Result;
use crate::ids::ParticipantId;
use crate::storage::Database;

/// A participant's stored nickname override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicknameRecord {
    /// Participant the override belongs to
    pub participant_id: ParticipantId,
    /// The override; `None` after it was cleared
    pub nickname: Option<String>,
    /// When the row was first written
    pub created_at: DateTime<Utc>,
    /// When the override last changed
    pub updated_at: DateTime<Utc>,
}

/// Nickname repository for database operations
pub struct NicknameRepository<'a> {
    db: &'a Database,
}

impl<'a> NicknameRepository<'a> {
    /// Create a new nickname repository
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Set (insert or replace) a participant's nickname
    ///
    /// Returns the stored, trimmed value.
    pub async fn set(&self, participant_id: ParticipantId, name: &str) -> Result<String> {
        let nickname = validate_nickname(name)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO nicknames (participant_id, nickname, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(participant_id) DO UPDATE SET
                nickname = excluded.nickname,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(participant_id.0)
        .bind(&nickname)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        debug!(participant_id = %participant_id, "Nickname set");
        Ok(nickname)
    }

    /// Clear a participant's nickname, keeping the row
    ///
    /// Clearing a participant without a row is a no-op.
    pub async fn clear(&self, participant_id: ParticipantId) -> Result<()> {
        sqlx::query("UPDATE nicknames SET nickname = NULL, updated_at = ? WHERE participant_id = ?")
            .bind(Utc::now())
            .bind(participant_id.0)
            .execute(self.db.pool())
            .await?;

        debug!(participant_id = %participant_id, "Nickname cleared");
        Ok(())
    }

    /// Get a participant's nickname, if one is set and non-blank
    pub async fn get(&self, participant_id: ParticipantId) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT nickname FROM nicknames WHERE participant_id = ?")
                .bind(participant_id.0)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row
            .and_then(|(nickname,)| nickname)
            .filter(|nickname| !nickname.trim().is_empty()))
    }

    /// Get the full record for a participant
    pub async fn get_record(&self, participant_id: ParticipantId) -> Result<Option<NicknameRecord>> {
        let row = sqlx::query(
            "SELECT participant_id, nickname, created_at, updated_at FROM nicknames WHERE participant_id = ?",
        )
        .bind(participant_id.0)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| self.row_to_record(r)))
    }

    /// List all records, most recently updated first
    pub async fn list(&self) -> Result<Vec<NicknameRecord>> {
        let rows = sqlx::query(
            "SELECT participant_id, nickname, created_at, updated_at FROM nicknames ORDER BY updated_at DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(|r| self.row_to_record(r)).collect())
    }

    /// Resolve the name shown for a participant in summaries
    pub async fn resolve_display_name(
        &self,
        participant_id: ParticipantId,
        fallback: Option<&str>,
    ) -> Result<DisplayName> {
        let nickname = self.get(participant_id).await?;
        Ok(DisplayName::resolve(nickname.as_deref(), fallback))
    }

    /// Convert a database row to a NicknameRecord
    fn row_to_record(&self, row: sqlx::sqlite::SqliteRow) -> NicknameRecord {
        NicknameRecord {
            participant_id: ParticipantId(row.get("participant_id")),
            nickname: row.get("nickname"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
