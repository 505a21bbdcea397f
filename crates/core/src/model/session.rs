use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::answer::Answer;
use crate::model::financial_year::FinancialYear;
use crate::model::ids::{CompanyId, ModuleId, QuestionId};
use crate::model::question::{Question, QuestionType};

/// Credentials returned by a successful login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub token: String,
    pub email: String,
    pub company_id: Option<CompanyId>,
    pub logged_in_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .field("company_id", &self.company_id)
            .field("logged_in_at", &self.logged_in_at)
            .finish()
    }
}

/// The question the assistant is currently helping with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveQuestion {
    pub question_id: QuestionId,
    pub module_id: ModuleId,
    pub text: String,
    pub guidance: String,
    pub question_type: QuestionType,
    pub current_answer: Option<Answer>,
}

impl ActiveQuestion {
    #[must_use]
    pub fn from_question(
        question: &Question,
        module_id: ModuleId,
        current_answer: Option<Answer>,
    ) -> Self {
        Self {
            question_id: question.id().clone(),
            module_id,
            text: question.text().to_owned(),
            guidance: question.guidance().to_owned(),
            question_type: question.question_type(),
            current_answer,
        }
    }
}

/// Everything a user session carries between interactions.
///
/// Held explicitly and persisted through a repository; nothing reads it from
/// ambient storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user: Option<UserSession>,
    pub financial_year: Option<FinancialYear>,
    pub active_question: Option<QuestionId>,
}

impl SessionContext {
    #[must_use]
    pub fn company_id(&self) -> Option<&CompanyId> {
        self.user.as_ref().and_then(|u| u.company_id.as_ref())
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.token.as_str())
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }
}
