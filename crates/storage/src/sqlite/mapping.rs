use brsr_core::model::{Answer, AnswerRecord, QuestionId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    let question_id: String = row.try_get("question_id").map_err(ser)?;
    let answer_json: String = row.try_get("answer_json").map_err(ser)?;
    let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at").map_err(ser)?;
    let answer: Answer = from_json(&answer_json)?;

    Ok(AnswerRecord::new(QuestionId::new(question_id), answer, updated_at))
}
