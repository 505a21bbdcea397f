//! Completion predicate: decides whether an answer counts as "answered".

use serde_json::Value;

use crate::model::{Answer, ScalarAnswer, SubjectiveAnswer, TableAnswer};

/// String cell values treated as "no value entered" in table answers.
///
/// This is literal string comparison, not numeric parsing: `"0.0"` or `"-0"`
/// are counted as answered.
pub const ZERO_CELL_LITERALS: [&str; 2] = ["0", "0.00"];

/// Returns true if the answer record carries a meaningful value.
#[must_use]
pub fn is_answered(answer: Option<&Answer>) -> bool {
    answer.is_some_and(Answer::is_answered)
}

impl Answer {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Table(table) => table.is_answered(),
            Answer::Subjective(subjective) => subjective.is_answered(),
            Answer::Scalar(scalar) => scalar.is_answered(),
        }
    }
}

impl TableAnswer {
    /// At least one row has at least one filled cell.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.rows.iter().any(|row| row.values().any(cell_has_value))
    }
}

impl SubjectiveAnswer {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl ScalarAnswer {
    /// Primitives count unless they are the empty string (untrimmed);
    /// objects count once they have a key.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        match self {
            ScalarAnswer::Text(v) | ScalarAnswer::Link(v) | ScalarAnswer::Note(v) => !v.is_empty(),
            ScalarAnswer::Decimal(_)
            | ScalarAnswer::Boolean(_)
            | ScalarAnswer::Provisions { .. } => true,
            ScalarAnswer::Structured(map) => !map.is_empty(),
        }
    }
}

/// Table cell check: non-blank strings other than the zero literals,
/// non-zero numbers, and any other truthy value.
#[must_use]
pub fn cell_has_value(cell: &Value) -> bool {
    match cell {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && !ZERO_CELL_LITERALS.contains(&trimmed)
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}
