use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::ids::QuestionId;

//
// ─── ANSWER SHAPES ─────────────────────────────────────────────────────────────
//

/// Legacy single-value answers (`string_value`, `decimal_value`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScalarAnswer {
    Text(String),
    Decimal(f64),
    Boolean(bool),
    Link(String),
    Note(String),
    Provisions {
        has_provisions: bool,
        explanation: Option<String>,
    },
    /// Any other JSON object the backend stores for a generic question.
    Structured(Map<String, Value>),
}

/// Free-text answer, optionally carrying custom sub-field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectiveAnswer {
    pub text: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl SubjectiveAnswer {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            fields: Map::new(),
        }
    }
}

/// One table row: column key -> cell value.
pub type TableRow = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableAnswer {
    pub rows: Vec<TableRow>,
}

/// A typed answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Scalar(ScalarAnswer),
    Subjective(SubjectiveAnswer),
    Table(TableAnswer),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// An answer together with the question it belongs to and its last update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub answer: Answer,
    pub updated_at: DateTime<Utc>,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(question_id: QuestionId, answer: Answer, updated_at: DateTime<Utc>) -> Self {
        Self {
            question_id,
            answer,
            updated_at,
        }
    }
}

/// Per-question answer records for one module scope.
///
/// Writes are last-write-wins: there is no conflict detection between
/// concurrent editors, the latest upsert replaces whatever was there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    records: BTreeMap<QuestionId, AnswerRecord>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<&AnswerRecord> {
        self.records.get(id)
    }

    #[must_use]
    pub fn answer(&self, id: &QuestionId) -> Option<&Answer> {
        self.records.get(id).map(|r| &r.answer)
    }

    /// Insert or replace a record, returning the previous one.
    pub fn upsert(&mut self, record: AnswerRecord) -> Option<AnswerRecord> {
        self.records.insert(record.question_id.clone(), record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn is_answered(&self, id: &QuestionId) -> bool {
        crate::completion::is_answered(self.answer(id))
    }
}

impl FromIterator<AnswerRecord> for AnswerStore {
    fn from_iter<I: IntoIterator<Item = AnswerRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for record in iter {
            store.upsert(record);
        }
        store
    }
}
