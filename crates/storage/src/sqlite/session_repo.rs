use async_trait::async_trait;
use brsr_core::model::SessionContext;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, ser, to_json};
use crate::repository::{SessionRepository, StorageError};

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn load_session(&self) -> Result<Option<SessionContext>, StorageError> {
        let row = sqlx::query("SELECT context_json FROM session_context WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("context_json").map_err(ser)?;
        from_json(&raw).map(Some)
    }

    async fn save_session(&self, context: &SessionContext) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO session_context (id, context_json, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                context_json = excluded.context_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(to_json(context)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_context WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
