use serde::{Deserialize, Serialize};

use crate::model::ids::QuestionId;

/// Sub-field key that marks a boolean question as a provisions pairing
/// (`has_provisions` + free-text explanation).
pub const PROVISIONS_FIELD: &str = "has_provisions";

//
// ─── QUESTION TYPE ─────────────────────────────────────────────────────────────
//

/// Declared answer type of a questionnaire entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Subjective,
    Table,
    TableWithAdditionalRows,
    Boolean,
    Decimal,
    Link,
    Note,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subjective => "subjective",
            Self::Table => "table",
            Self::TableWithAdditionalRows => "table_with_additional_rows",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Link => "link",
            Self::Note => "note",
        }
    }

    #[must_use]
    pub fn is_table(self) -> bool {
        matches!(self, Self::Table | Self::TableWithAdditionalRows)
    }
}

//
// ─── METADATA ──────────────────────────────────────────────────────────────────
//

/// Input kind for a typed sub-field or table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Text,
    Decimal,
    Boolean,
    Link,
    Note,
    #[serde(other)]
    Other,
}

/// One typed input of a custom subjective form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubField {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub unit: Option<String>,
}

/// A fixed (pre-labelled) row of a table question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRowSpec {
    pub key: String,
    #[serde(default)]
    pub label: String,
}

/// Optional schema attached to a question: typed sub-fields for custom
/// subjective forms, or a column/row layout for tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMetadata {
    #[serde(default)]
    pub fields: Vec<SubField>,
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    #[serde(default)]
    pub rows: Vec<TableRowSpec>,
}

impl QuestionMetadata {
    #[must_use]
    pub fn column(&self, key: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.key == key)
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A questionnaire entry as loaded from the backend. Immutable for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(alias = "question_id")]
    id: QuestionId,
    #[serde(alias = "question")]
    text: String,
    #[serde(default)]
    guidance: String,
    #[serde(rename = "type")]
    question_type: QuestionType,
    #[serde(default)]
    metadata: Option<QuestionMetadata>,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, text: impl Into<String>, question_type: QuestionType) -> Self {
        Self {
            id,
            text: text.into(),
            guidance: String::new(),
            question_type,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = guidance.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: QuestionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn guidance(&self) -> &str {
        &self.guidance
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&QuestionMetadata> {
        self.metadata.as_ref()
    }

    /// Sub-fields of a custom subjective form (empty when none are declared).
    #[must_use]
    pub fn sub_fields(&self) -> &[SubField] {
        self.metadata.as_ref().map_or(&[], |m| m.fields.as_slice())
    }

    /// True for a boolean question carrying the `has_provisions` pairing.
    #[must_use]
    pub fn is_provisions(&self) -> bool {
        self.question_type == QuestionType::Boolean
            && self.sub_fields().iter().any(|f| f.key == PROVISIONS_FIELD)
    }
}
