//! Pre-submission validation of the answer edit form.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::model::{FieldKind, Question, QuestionType, TableRow};

pub const REQUIRED: &str = "This field is required";
pub const INVALID_NUMBER: &str = "Please enter a valid number";
pub const INVALID_URL: &str = "Please enter a valid URL";
pub const EXPLANATION_REQUIRED: &str = "Please explain the provisions made";
pub const TYPE_MISMATCH: &str = "Answer does not match the question type";

//
// ─── FORM INPUT ────────────────────────────────────────────────────────────────
//

/// Raw values captured by the edit form, one variant per input layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerForm {
    Text {
        value: String,
    },
    Decimal {
        raw: String,
    },
    Boolean {
        value: Option<bool>,
    },
    Link {
        value: String,
    },
    Note {
        value: String,
    },
    Provisions {
        has_provisions: Option<bool>,
        explanation: String,
    },
    Subjective {
        text: String,
        #[serde(default)]
        fields: Map<String, Value>,
    },
    Table {
        rows: Vec<TableRow>,
    },
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// A validation message attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: &str) -> Self {
        Self {
            field: field.into(),
            message: message.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Message for a specific field, if it failed.
    #[must_use]
    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for err in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", err.field, err.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

//
// ─── VALIDATION ────────────────────────────────────────────────────────────────
//

/// Validate a form against the question it answers.
///
/// # Errors
///
/// Returns `ValidationErrors` with one entry per failing field.
pub fn validate(question: &Question, form: &AnswerForm) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if !form_fits(question, form) {
        errors.push("answer", TYPE_MISMATCH);
        return errors.into_result();
    }

    match form {
        AnswerForm::Text { value } => require(&mut errors, "string_value", value),
        AnswerForm::Note { value } => require(&mut errors, "note", value),
        AnswerForm::Decimal { raw } => {
            if raw.trim().is_empty() {
                errors.push("decimal_value", REQUIRED);
            } else if parse_decimal(raw).is_none() {
                errors.push("decimal_value", INVALID_NUMBER);
            }
        }
        AnswerForm::Boolean { value } => {
            if value.is_none() {
                errors.push("boolean_value", REQUIRED);
            }
        }
        AnswerForm::Link { value } => {
            if value.trim().is_empty() {
                errors.push("link", REQUIRED);
            } else if !is_valid_link(value) {
                errors.push("link", INVALID_URL);
            }
        }
        AnswerForm::Provisions {
            has_provisions,
            explanation,
        } => match has_provisions {
            None => errors.push("has_provisions", REQUIRED),
            Some(false) => {}
            Some(true) => {
                if explanation.trim().is_empty() {
                    errors.push("explanation", EXPLANATION_REQUIRED);
                }
            }
        },
        AnswerForm::Subjective { text, fields } => {
            validate_subjective(&mut errors, question, text, fields);
        }
        AnswerForm::Table { rows } => validate_table(&mut errors, question, rows),
    }

    errors.into_result()
}

fn form_fits(question: &Question, form: &AnswerForm) -> bool {
    match (question.question_type(), form) {
        (QuestionType::Subjective, AnswerForm::Subjective { .. })
        | (QuestionType::Table | QuestionType::TableWithAdditionalRows, AnswerForm::Table { .. })
        | (QuestionType::Decimal, AnswerForm::Decimal { .. })
        | (QuestionType::Link, AnswerForm::Link { .. })
        | (QuestionType::Note, AnswerForm::Note { .. }) => true,
        // Plain text only answers a subjective question without sub-fields.
        (QuestionType::Subjective, AnswerForm::Text { .. }) => question.sub_fields().is_empty(),
        (QuestionType::Boolean, AnswerForm::Provisions { .. }) => question.is_provisions(),
        (QuestionType::Boolean, AnswerForm::Boolean { .. }) => !question.is_provisions(),
        _ => false,
    }
}

fn require(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, REQUIRED);
    }
}

fn validate_subjective(
    errors: &mut ValidationErrors,
    question: &Question,
    text: &str,
    fields: &Map<String, Value>,
) {
    let declared = question.sub_fields();
    if declared.is_empty() {
        require(errors, "text", text);
        return;
    }

    for field in declared {
        let value = fields.get(&field.key);
        if field.required && !value.is_some_and(value_present) {
            errors.push(field.key.clone(), REQUIRED);
            continue;
        }
        match (field.kind, value) {
            (FieldKind::Decimal, Some(Value::String(raw)))
                if !raw.trim().is_empty() && parse_decimal(raw).is_none() =>
            {
                errors.push(field.key.clone(), INVALID_NUMBER);
            }
            (FieldKind::Link, Some(Value::String(raw)))
                if !raw.trim().is_empty() && !is_valid_link(raw) =>
            {
                errors.push(field.key.clone(), INVALID_URL);
            }
            _ => {}
        }
    }
}

fn validate_table(errors: &mut ValidationErrors, question: &Question, rows: &[TableRow]) {
    let Some(meta) = question.metadata() else {
        return;
    };
    for (index, row) in rows.iter().enumerate() {
        for (key, cell) in row {
            let numeric = meta
                .column(key)
                .is_some_and(|c| c.kind == FieldKind::Decimal);
            if !numeric {
                continue;
            }
            if let Value::String(raw) = cell {
                if !raw.trim().is_empty() && parse_decimal(raw).is_none() {
                    errors.push(format!("rows[{index}].{key}"), INVALID_NUMBER);
                }
            }
        }
    }
}

fn value_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Parse a user-entered decimal (`"1,250.5"` is accepted).
#[must_use]
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalise a link into an absolute http(s) URL.
///
/// Bare hosts such as `example.com/report.pdf` are read as `https://`.
#[must_use]
pub fn normalize_link(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if host.contains('.') || host == "localhost" {
        Some(url)
    } else {
        None
    }
}

#[must_use]
pub fn is_valid_link(raw: &str) -> bool {
    normalize_link(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        PROVISIONS_FIELD, QuestionId, QuestionMetadata, SubField, TableColumn,
    };
    use serde_json::json;

    fn question(ty: QuestionType) -> Question {
        Question::new(QuestionId::new("Q1"), "Question", ty)
    }

    fn provisions_question() -> Question {
        question(QuestionType::Boolean).with_metadata(QuestionMetadata {
            fields: vec![SubField {
                key: PROVISIONS_FIELD.into(),
                label: "Provisions?".into(),
                kind: FieldKind::Boolean,
                required: true,
            }],
            ..QuestionMetadata::default()
        })
    }

    #[test]
    fn required_scalars() {
        let err = validate(
            &question(QuestionType::Subjective),
            &AnswerForm::Text { value: "  ".into() },
        )
        .unwrap_err();
        assert_eq!(err.for_field("string_value"), Some(REQUIRED));

        let err = validate(
            &question(QuestionType::Note),
            &AnswerForm::Note { value: String::new() },
        )
        .unwrap_err();
        assert_eq!(err.for_field("note"), Some(REQUIRED));

        let err = validate(
            &question(QuestionType::Boolean),
            &AnswerForm::Boolean { value: None },
        )
        .unwrap_err();
        assert_eq!(err.for_field("boolean_value"), Some(REQUIRED));
        assert!(
            validate(
                &question(QuestionType::Boolean),
                &AnswerForm::Boolean { value: Some(false) }
            )
            .is_ok()
        );
    }

    #[test]
    fn decimal_must_be_numeric() {
        let q = question(QuestionType::Decimal);
        let err = validate(&q, &AnswerForm::Decimal { raw: "12a".into() }).unwrap_err();
        assert_eq!(err.for_field("decimal_value"), Some(INVALID_NUMBER));
        let err = validate(&q, &AnswerForm::Decimal { raw: " ".into() }).unwrap_err();
        assert_eq!(err.for_field("decimal_value"), Some(REQUIRED));
        assert!(validate(&q, &AnswerForm::Decimal { raw: "1,250.75".into() }).is_ok());
        assert!(validate(&q, &AnswerForm::Decimal { raw: "NaN".into() }).is_err());
    }

    #[test]
    fn links_are_format_checked() {
        let q = question(QuestionType::Link);
        assert!(validate(&q, &AnswerForm::Link { value: "https://example.com/brsr.pdf".into() }).is_ok());
        assert!(validate(&q, &AnswerForm::Link { value: "example.com/policy".into() }).is_ok());
        let err = validate(&q, &AnswerForm::Link { value: "not a link".into() }).unwrap_err();
        assert_eq!(err.for_field("link"), Some(INVALID_URL));
        assert!(validate(&q, &AnswerForm::Link { value: "ftp://example.com".into() }).is_err());
        assert!(validate(&q, &AnswerForm::Link { value: "intranet".into() }).is_err());
    }

    #[test]
    fn provisions_pairing() {
        let q = provisions_question();
        assert!(
            validate(
                &q,
                &AnswerForm::Provisions {
                    has_provisions: Some(false),
                    explanation: String::new(),
                }
            )
            .is_ok()
        );

        let err = validate(
            &q,
            &AnswerForm::Provisions {
                has_provisions: Some(true),
                explanation: "  ".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.for_field("explanation"), Some(EXPLANATION_REQUIRED));

        let err = validate(
            &q,
            &AnswerForm::Provisions {
                has_provisions: None,
                explanation: "x".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.for_field("has_provisions"), Some(REQUIRED));
    }

    #[test]
    fn form_must_fit_question() {
        let err = validate(
            &question(QuestionType::Decimal),
            &AnswerForm::Note { value: "x".into() },
        )
        .unwrap_err();
        assert_eq!(err.for_field("answer"), Some(TYPE_MISMATCH));

        let plain_boolean = question(QuestionType::Boolean);
        assert!(
            validate(
                &plain_boolean,
                &AnswerForm::Provisions {
                    has_provisions: Some(false),
                    explanation: String::new()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn subjective_sub_fields() {
        let q = question(QuestionType::Subjective).with_metadata(QuestionMetadata {
            fields: vec![
                SubField {
                    key: "policy".into(),
                    label: "Policy".into(),
                    kind: FieldKind::Text,
                    required: true,
                },
                SubField {
                    key: "budget".into(),
                    label: "Budget".into(),
                    kind: FieldKind::Decimal,
                    required: false,
                },
            ],
            ..QuestionMetadata::default()
        });

        let mut fields = Map::new();
        fields.insert("budget".into(), json!("lots"));
        let err = validate(
            &q,
            &AnswerForm::Subjective {
                text: String::new(),
                fields,
            },
        )
        .unwrap_err();
        assert_eq!(err.for_field("policy"), Some(REQUIRED));
        assert_eq!(err.for_field("budget"), Some(INVALID_NUMBER));
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn plain_text_cannot_skip_required_sub_fields() {
        let q = question(QuestionType::Subjective).with_metadata(QuestionMetadata {
            fields: vec![SubField {
                key: "policy".into(),
                label: "Policy".into(),
                kind: FieldKind::Text,
                required: true,
            }],
            ..QuestionMetadata::default()
        });

        let err = validate(
            &q,
            &AnswerForm::Text {
                value: "anything".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.for_field("answer"), Some(TYPE_MISMATCH));

        let plain = question(QuestionType::Subjective);
        assert!(
            validate(
                &plain,
                &AnswerForm::Text {
                    value: "anything".into()
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn subjective_without_metadata_needs_text() {
        let q = question(QuestionType::Subjective);
        assert!(
            validate(
                &q,
                &AnswerForm::Subjective {
                    text: " ".into(),
                    fields: Map::new()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn table_decimal_columns() {
        let q = question(QuestionType::Table).with_metadata(QuestionMetadata {
            columns: vec![
                TableColumn {
                    key: "qty".into(),
                    label: "Quantity".into(),
                    kind: FieldKind::Decimal,
                    unit: None,
                },
                TableColumn {
                    key: "source".into(),
                    label: "Source".into(),
                    kind: FieldKind::Text,
                    unit: None,
                },
            ],
            ..QuestionMetadata::default()
        });
        let mut ok_row = Map::new();
        ok_row.insert("qty".into(), json!("10.5"));
        ok_row.insert("source".into(), json!("grid"));
        let mut bad_row = Map::new();
        bad_row.insert("qty".into(), json!("ten"));

        let err = validate(
            &q,
            &AnswerForm::Table {
                rows: vec![ok_row, bad_row],
            },
        )
        .unwrap_err();
        assert_eq!(err.for_field("rows[1].qty"), Some(INVALID_NUMBER));
        assert_eq!(err.to_string(), "rows[1].qty: Please enter a valid number");
    }
}
