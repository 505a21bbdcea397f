use brsr_core::model::{AnswerRecord, AnswerStore, QuestionId};

use super::SqliteRepository;
use super::mapping::{conn, map_answer_row, to_json};
use crate::repository::{AnswerRepository, AnswerScope, StorageError};

const UPSERT_ANSWER: &str = r"
    INSERT INTO answers (
        module_id, company_id, plant_id, financial_year, question_id, answer_json, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(module_id, company_id, plant_id, financial_year, question_id) DO UPDATE SET
        answer_json = excluded.answer_json,
        updated_at = excluded.updated_at
";

#[async_trait::async_trait]
impl AnswerRepository for SqliteRepository {
    async fn upsert_answer(
        &self,
        scope: &AnswerScope,
        record: &AnswerRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(UPSERT_ANSWER)
            .bind(scope.module_id.as_str())
            .bind(scope.company_id.as_str())
            .bind(scope.plant_id.as_str())
            .bind(scope.financial_year.to_string())
            .bind(record.question_id.as_str())
            .bind(to_json(&record.answer)?)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn replace_answers(
        &self,
        scope: &AnswerScope,
        records: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let fy = scope.financial_year.to_string();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            DELETE FROM answers
            WHERE module_id = ?1 AND company_id = ?2 AND plant_id = ?3 AND financial_year = ?4
            ",
        )
        .bind(scope.module_id.as_str())
        .bind(scope.company_id.as_str())
        .bind(scope.plant_id.as_str())
        .bind(fy.as_str())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for record in records {
            sqlx::query(UPSERT_ANSWER)
                .bind(scope.module_id.as_str())
                .bind(scope.company_id.as_str())
                .bind(scope.plant_id.as_str())
                .bind(fy.as_str())
                .bind(record.question_id.as_str())
                .bind(to_json(&record.answer)?)
                .bind(record.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_answer(
        &self,
        scope: &AnswerScope,
        question_id: &QuestionId,
    ) -> Result<Option<AnswerRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT question_id, answer_json, updated_at
            FROM answers
            WHERE module_id = ?1 AND company_id = ?2 AND plant_id = ?3 AND financial_year = ?4
              AND question_id = ?5
            ",
        )
        .bind(scope.module_id.as_str())
        .bind(scope.company_id.as_str())
        .bind(scope.plant_id.as_str())
        .bind(scope.financial_year.to_string())
        .bind(question_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_answer_row).transpose()
    }

    async fn load_answers(&self, scope: &AnswerScope) -> Result<AnswerStore, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT question_id, answer_json, updated_at
            FROM answers
            WHERE module_id = ?1 AND company_id = ?2 AND plant_id = ?3 AND financial_year = ?4
            ORDER BY question_id ASC
            ",
        )
        .bind(scope.module_id.as_str())
        .bind(scope.company_id.as_str())
        .bind(scope.plant_id.as_str())
        .bind(scope.financial_year.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut store = AnswerStore::new();
        for row in rows {
            store.upsert(map_answer_row(&row)?);
        }
        Ok(store)
    }
}
