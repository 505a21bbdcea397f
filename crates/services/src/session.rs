use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use brsr_core::model::{
    ActiveQuestion, CompanyId, FinancialYear, QuestionId, SessionContext, UserSession,
};
use storage::repository::{QuestionCacheRepository, SessionRepository};

use crate::Clock;
use crate::api::ReportApi;
use crate::error::{MissingContext, SessionError};

/// Owns the user's session context and keeps it persisted.
///
/// Everything that other services would otherwise read from ambient storage
/// (token, company, financial year, active question) lives here.
pub struct SessionService {
    clock: Clock,
    api: Arc<dyn ReportApi>,
    sessions: Arc<dyn SessionRepository>,
    question_cache: Arc<dyn QuestionCacheRepository>,
    context: Mutex<SessionContext>,
}

impl SessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        api: Arc<dyn ReportApi>,
        sessions: Arc<dyn SessionRepository>,
        question_cache: Arc<dyn QuestionCacheRepository>,
    ) -> Self {
        Self {
            clock,
            api,
            sessions,
            question_cache,
            context: Mutex::new(SessionContext::default()),
        }
    }

    /// Load the persisted context and install its token on the API client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the context cannot be read.
    pub async fn restore(&self) -> Result<SessionContext, SessionError> {
        let restored = self.sessions.load_session().await?.unwrap_or_default();
        self.api
            .set_token(restored.token().filter(|t| !t.is_empty()).map(str::to_owned));
        debug!(logged_in = restored.is_logged_in(), "session restored");
        let mut guard = self.context.lock().await;
        *guard = restored.clone();
        Ok(restored)
    }

    /// Authenticate and persist the returned credentials.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` if login fails, or `Storage` if the
    /// context cannot be saved.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSession, SessionError> {
        let response = self.api.login(email, password).await?;
        let user = UserSession {
            token: response.token,
            email: response.email,
            company_id: response.company_id,
            logged_in_at: self.clock.now(),
        };
        self.api.set_token(Some(user.token.clone()));

        let mut guard = self.context.lock().await;
        guard.user = Some(user.clone());
        self.sessions.save_session(&guard).await?;
        info!(email = %user.email, "logged in");
        Ok(user)
    }

    /// Drop credentials and every cached question context.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on backend failures.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.api.set_token(None);
        let mut guard = self.context.lock().await;
        *guard = SessionContext::default();
        self.sessions.clear_session().await?;
        self.question_cache.clear_questions().await?;
        info!("logged out");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the context cannot be saved.
    pub async fn set_financial_year(&self, financial_year: FinancialYear) -> Result<(), SessionError> {
        let mut guard = self.context.lock().await;
        guard.financial_year = Some(financial_year);
        self.sessions.save_session(&guard).await?;
        debug!(%financial_year, "financial year selected");
        Ok(())
    }

    /// Override the company for users whose login carried none.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the context cannot be saved.
    pub async fn set_company(&self, company_id: CompanyId) -> Result<(), SessionError> {
        let now = self.clock.now();
        let mut guard = self.context.lock().await;
        let user = guard.user.get_or_insert_with(|| UserSession {
            token: String::new(),
            email: String::new(),
            company_id: None,
            logged_in_at: now,
        });
        user.company_id = Some(company_id);
        self.sessions.save_session(&guard).await?;
        Ok(())
    }

    /// Make `question` the one the assistant is helping with.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the cache or context cannot be saved.
    pub async fn activate_question(&self, question: ActiveQuestion) -> Result<(), SessionError> {
        self.question_cache.put_question(&question).await?;
        let mut guard = self.context.lock().await;
        guard.active_question = Some(question.question_id.clone());
        self.sessions.save_session(&guard).await?;
        debug!(question_id = %question.question_id, "question activated");
        Ok(())
    }

    /// The cached context of the active question, if any.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on backend failures.
    pub async fn active_question(&self) -> Result<Option<ActiveQuestion>, SessionError> {
        let id: Option<QuestionId> = self.context.lock().await.active_question.clone();
        match id {
            Some(id) => Ok(self.question_cache.get_question(&id).await?),
            None => Ok(None),
        }
    }

    /// # Errors
    ///
    /// Returns `MissingContext::CompanyId` when no company is known.
    pub async fn require_company(&self) -> Result<CompanyId, MissingContext> {
        self.context
            .lock()
            .await
            .company_id()
            .cloned()
            .ok_or(MissingContext::CompanyId)
    }

    /// # Errors
    ///
    /// Returns `MissingContext::FinancialYear` when none is selected.
    pub async fn require_financial_year(&self) -> Result<FinancialYear, MissingContext> {
        self.context
            .lock()
            .await
            .financial_year
            .ok_or(MissingContext::FinancialYear)
    }
}
