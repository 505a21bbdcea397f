//! Mapping between typed answers and the backend's wire shapes.
//!
//! The backend speaks three dialects:
//!
//! * legacy scalar fields: `{"string_value": ..}`, `{"decimal_value": ..}`,
//!   `{"boolean_value": ..}`, `{"link": ..}`, `{"note": ..}`,
//!   `{"has_provisions": .., "explanation": ..}`
//! * structured subjective objects: `{"type": "subjective", "data": {"text": ..}}`
//! * table rows: `{"data": [{col: value, ..}, ..]}`

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::model::{
    Answer, Question, QuestionType, ScalarAnswer, SubjectiveAnswer, TableAnswer, TableRow,
};
use crate::validation::{AnswerForm, parse_decimal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
    #[error("unexpected {question_type} answer shape: {detail}")]
    UnexpectedShape {
        question_type: &'static str,
        detail: String,
    },

    #[error("not a number: {0:?}")]
    InvalidDecimal(String),

    #[error("a yes/no selection is required")]
    MissingSelection,
}

/// Which backend mutation persists an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRoute {
    Table,
    Subjective,
    Generic,
}

impl SaveRoute {
    #[must_use]
    pub fn for_type(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Table | QuestionType::TableWithAdditionalRows => Self::Table,
            QuestionType::Subjective => Self::Subjective,
            QuestionType::Boolean
            | QuestionType::Decimal
            | QuestionType::Link
            | QuestionType::Note => Self::Generic,
        }
    }
}

//
// ─── FORM -> ANSWER ────────────────────────────────────────────────────────────
//

impl AnswerForm {
    /// Convert a validated form into a typed answer.
    ///
    /// Blank rows (every cell null or whitespace) are dropped from tables.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError` for values that cannot be represented, such as a
    /// non-numeric decimal; run `validation::validate` first to get
    /// field-level messages instead.
    pub fn into_answer(self, question: &Question) -> Result<Answer, PayloadError> {
        let answer = match self {
            AnswerForm::Text { value } => {
                if question.question_type() == QuestionType::Subjective
                    && question.sub_fields().is_empty()
                {
                    Answer::Subjective(SubjectiveAnswer::text(value.trim()))
                } else {
                    Answer::Scalar(ScalarAnswer::Text(value.trim().to_owned()))
                }
            }
            AnswerForm::Decimal { raw } => {
                let value = parse_decimal(&raw).ok_or(PayloadError::InvalidDecimal(raw))?;
                Answer::Scalar(ScalarAnswer::Decimal(value))
            }
            AnswerForm::Boolean { value } => {
                Answer::Scalar(ScalarAnswer::Boolean(value.ok_or(PayloadError::MissingSelection)?))
            }
            AnswerForm::Link { value } => Answer::Scalar(ScalarAnswer::Link(value.trim().to_owned())),
            AnswerForm::Note { value } => Answer::Scalar(ScalarAnswer::Note(value.trim().to_owned())),
            AnswerForm::Provisions {
                has_provisions,
                explanation,
            } => {
                let has_provisions = has_provisions.ok_or(PayloadError::MissingSelection)?;
                let explanation = explanation.trim();
                Answer::Scalar(ScalarAnswer::Provisions {
                    has_provisions,
                    explanation: (has_provisions && !explanation.is_empty())
                        .then(|| explanation.to_owned()),
                })
            }
            AnswerForm::Subjective { text, fields } => {
                let text = text.trim();
                Answer::Subjective(SubjectiveAnswer {
                    text: (!text.is_empty()).then(|| text.to_owned()),
                    fields,
                })
            }
            AnswerForm::Table { rows } => Answer::Table(TableAnswer {
                rows: rows.into_iter().filter(|row| !row_is_blank(row)).collect(),
            }),
        };
        Ok(answer)
    }
}

fn row_is_blank(row: &TableRow) -> bool {
    row.values().all(|cell| match cell {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    })
}

//
// ─── ANSWER -> WIRE ────────────────────────────────────────────────────────────
//

impl Answer {
    /// Backend payload for this answer.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        match self {
            Answer::Scalar(scalar) => match scalar {
                ScalarAnswer::Text(v) => json!({ "string_value": v }),
                ScalarAnswer::Decimal(v) => json!({ "decimal_value": v }),
                ScalarAnswer::Boolean(v) => json!({ "boolean_value": v }),
                ScalarAnswer::Link(v) => json!({ "link": v }),
                ScalarAnswer::Note(v) => json!({ "note": v }),
                ScalarAnswer::Provisions {
                    has_provisions,
                    explanation,
                } => json!({
                    "has_provisions": has_provisions,
                    "explanation": explanation,
                }),
                ScalarAnswer::Structured(map) => Value::Object(map.clone()),
            },
            Answer::Subjective(subjective) => {
                let mut data = subjective.fields.clone();
                data.insert(
                    "text".into(),
                    subjective
                        .text
                        .as_ref()
                        .map_or(Value::Null, |t| Value::String(t.clone())),
                );
                json!({ "type": "subjective", "data": data })
            }
            Answer::Table(table) => json!({ "data": table.rows }),
        }
    }

    /// Parse an answer value returned by the backend.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::UnexpectedShape` when the value fits none of the
    /// known dialects for the question type.
    pub fn from_wire(question_type: QuestionType, value: &Value) -> Result<Answer, PayloadError> {
        let unexpected = |detail: &str| PayloadError::UnexpectedShape {
            question_type: question_type.as_str(),
            detail: detail.to_owned(),
        };

        if question_type.is_table() {
            let rows = match value {
                Value::Array(rows) => rows,
                Value::Object(obj) => match obj.get("data") {
                    Some(Value::Array(rows)) => rows,
                    Some(Value::Null) | None => return Ok(Answer::Table(TableAnswer::default())),
                    Some(_) => return Err(unexpected("`data` is not a row array")),
                },
                Value::Null => return Ok(Answer::Table(TableAnswer::default())),
                _ => return Err(unexpected("expected rows")),
            };
            let rows = rows
                .iter()
                .map(|row| match row {
                    Value::Object(map) => Ok(map.clone()),
                    _ => Err(unexpected("row is not an object")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Answer::Table(TableAnswer { rows }));
        }

        match value {
            Value::Object(obj) => {
                if let Some(Value::Object(data)) = obj.get("data") {
                    return Ok(Answer::Subjective(subjective_from_data(data)));
                }
                scalar_from_object(question_type, obj)
                    .map(Answer::Scalar)
                    .ok_or_else(|| unexpected("unrecognised fields"))
            }
            Value::String(s) => Ok(match question_type {
                QuestionType::Subjective => Answer::Subjective(SubjectiveAnswer::text(s.clone())),
                QuestionType::Link => Answer::Scalar(ScalarAnswer::Link(s.clone())),
                QuestionType::Note => Answer::Scalar(ScalarAnswer::Note(s.clone())),
                QuestionType::Decimal => Answer::Scalar(ScalarAnswer::Decimal(
                    parse_decimal(s).ok_or_else(|| PayloadError::InvalidDecimal(s.clone()))?,
                )),
                _ => Answer::Scalar(ScalarAnswer::Text(s.clone())),
            }),
            Value::Number(n) => n
                .as_f64()
                .map(|v| Answer::Scalar(ScalarAnswer::Decimal(v)))
                .ok_or_else(|| unexpected("number out of range")),
            Value::Bool(b) => Ok(Answer::Scalar(ScalarAnswer::Boolean(*b))),
            Value::Null | Value::Array(_) => Err(unexpected("expected an object or primitive")),
        }
    }
}

fn subjective_from_data(data: &Map<String, Value>) -> SubjectiveAnswer {
    let mut fields = data.clone();
    let text = match fields.remove("text") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };
    SubjectiveAnswer { text, fields }
}

fn scalar_from_object(question_type: QuestionType, obj: &Map<String, Value>) -> Option<ScalarAnswer> {
    let str_field = |key: &str| match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };

    if let Some(flag) = obj.get("has_provisions").and_then(Value::as_bool) {
        return Some(ScalarAnswer::Provisions {
            has_provisions: flag,
            explanation: str_field("explanation").filter(|e| !e.trim().is_empty()),
        });
    }

    let field_order: &[&str] = match question_type {
        QuestionType::Link => &["link", "string_value", "note"],
        QuestionType::Note => &["note", "string_value", "link"],
        _ => &["string_value", "link", "note"],
    };
    let prefer_decimal = question_type == QuestionType::Decimal;
    let prefer_boolean = question_type == QuestionType::Boolean;

    let decimal = match obj.get("decimal_value") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_decimal(s),
        _ => None,
    };
    let boolean = obj.get("boolean_value").and_then(Value::as_bool);

    if prefer_decimal {
        if let Some(v) = decimal {
            return Some(ScalarAnswer::Decimal(v));
        }
    }
    if prefer_boolean {
        if let Some(b) = boolean {
            return Some(ScalarAnswer::Boolean(b));
        }
    }

    for key in field_order {
        if let Some(v) = str_field(key) {
            return Some(match *key {
                "link" => ScalarAnswer::Link(v),
                "note" => ScalarAnswer::Note(v),
                _ => ScalarAnswer::Text(v),
            });
        }
    }
    if let Some(v) = decimal {
        return Some(ScalarAnswer::Decimal(v));
    }
    if let Some(b) = boolean {
        return Some(ScalarAnswer::Boolean(b));
    }

    let known = [
        "string_value",
        "decimal_value",
        "boolean_value",
        "link",
        "note",
    ];
    if obj.keys().all(|k| known.contains(&k.as_str())) {
        // only null legacy fields: nothing was entered
        return None;
    }
    Some(ScalarAnswer::Structured(obj.clone()))
}
