use async_trait::async_trait;
use brsr_core::model::{ActiveQuestion, QuestionId};
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, ser, to_json};
use crate::repository::{QuestionCacheRepository, StorageError};

#[async_trait]
impl QuestionCacheRepository for SqliteRepository {
    async fn put_question(&self, question: &ActiveQuestion) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO question_cache (question_id, module_id, payload_json, cached_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(question_id) DO UPDATE SET
                module_id = excluded.module_id,
                payload_json = excluded.payload_json,
                cached_at = excluded.cached_at
            ",
        )
        .bind(question.question_id.as_str())
        .bind(question.module_id.as_str())
        .bind(to_json(question)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<ActiveQuestion>, StorageError> {
        let row = sqlx::query("SELECT payload_json FROM question_cache WHERE question_id = ?1")
            .bind(question_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("payload_json").map_err(ser)?;
        from_json(&raw).map(Some)
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM question_cache")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
