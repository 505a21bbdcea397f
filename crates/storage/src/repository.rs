use async_trait::async_trait;
use brsr_core::model::{
    ActiveQuestion, AnswerRecord, AnswerStore, CompanyId, FinancialYear, ModuleId, PlantId,
    QuestionId, ReportScope, SessionContext,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Key of one answer set: a module filled for a company's plant in a
/// financial year.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnswerScope {
    pub module_id: ModuleId,
    pub company_id: CompanyId,
    pub plant_id: PlantId,
    pub financial_year: FinancialYear,
}

impl AnswerScope {
    #[must_use]
    pub fn new(module_id: ModuleId, scope: &ReportScope) -> Self {
        Self {
            module_id,
            company_id: scope.company_id.clone(),
            plant_id: scope.plant_id.clone(),
            financial_year: scope.financial_year,
        }
    }
}

/// Repository contract for the local answer store.
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Insert or replace one answer (last write wins).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the answer cannot be stored.
    async fn upsert_answer(
        &self,
        scope: &AnswerScope,
        record: &AnswerRecord,
    ) -> Result<(), StorageError>;

    /// Replace the whole answer set of a scope with a fresh server snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn replace_answers(
        &self,
        scope: &AnswerScope,
        records: &[AnswerRecord],
    ) -> Result<(), StorageError>;

    /// Fetch one answer, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_answer(
        &self,
        scope: &AnswerScope,
        question_id: &QuestionId,
    ) -> Result<Option<AnswerRecord>, StorageError>;

    /// Load every answer of a scope.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_answers(&self, scope: &AnswerScope) -> Result<AnswerStore, StorageError>;
}

/// Persisted session context (credentials, financial year, active question).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_session(&self) -> Result<Option<SessionContext>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the context cannot be stored.
    async fn save_session(&self, context: &SessionContext) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

/// Cache of assistant question context keyed by question id.
#[async_trait]
pub trait QuestionCacheRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn put_question(&self, question: &ActiveQuestion) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<ActiveQuestion>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_questions(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    answers: Arc<Mutex<HashMap<AnswerScope, AnswerStore>>>,
    session: Arc<Mutex<Option<SessionContext>>>,
    questions: Arc<Mutex<HashMap<QuestionId, ActiveQuestion>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl AnswerRepository for InMemoryRepository {
    async fn upsert_answer(
        &self,
        scope: &AnswerScope,
        record: &AnswerRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self.answers.lock().map_err(poisoned)?;
        guard
            .entry(scope.clone())
            .or_default()
            .upsert(record.clone());
        Ok(())
    }

    async fn replace_answers(
        &self,
        scope: &AnswerScope,
        records: &[AnswerRecord],
    ) -> Result<(), StorageError> {
        let mut guard = self.answers.lock().map_err(poisoned)?;
        guard.insert(scope.clone(), records.iter().cloned().collect());
        Ok(())
    }

    async fn get_answer(
        &self,
        scope: &AnswerScope,
        question_id: &QuestionId,
    ) -> Result<Option<AnswerRecord>, StorageError> {
        let guard = self.answers.lock().map_err(poisoned)?;
        Ok(guard
            .get(scope)
            .and_then(|store| store.get(question_id))
            .cloned())
    }

    async fn load_answers(&self, scope: &AnswerScope) -> Result<AnswerStore, StorageError> {
        let guard = self.answers.lock().map_err(poisoned)?;
        Ok(guard.get(scope).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn load_session(&self) -> Result<Option<SessionContext>, StorageError> {
        let guard = self.session.lock().map_err(poisoned)?;
        Ok(guard.clone())
    }

    async fn save_session(&self, context: &SessionContext) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = Some(context.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        let mut guard = self.session.lock().map_err(poisoned)?;
        *guard = None;
        Ok(())
    }
}

#[async_trait]
impl QuestionCacheRepository for InMemoryRepository {
    async fn put_question(&self, question: &ActiveQuestion) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.question_id.clone(), question.clone());
        Ok(())
    }

    async fn get_question(
        &self,
        question_id: &QuestionId,
    ) -> Result<Option<ActiveQuestion>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.get(question_id).cloned())
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.clear();
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub answers: Arc<dyn AnswerRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub question_cache: Arc<dyn QuestionCacheRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let answers: Arc<dyn AnswerRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let question_cache: Arc<dyn QuestionCacheRepository> = Arc::new(repo);
        Self {
            answers,
            sessions,
            question_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brsr_core::model::{Answer, QuestionType, ScalarAnswer};
    use brsr_core::time::fixed_now;

    fn scope(module: &str) -> AnswerScope {
        AnswerScope {
            module_id: ModuleId::new(module),
            company_id: CompanyId::new("c1"),
            plant_id: PlantId::new("P001"),
            financial_year: FinancialYear::starting(2023),
        }
    }

    fn note(id: &str, value: &str) -> AnswerRecord {
        AnswerRecord::new(
            QuestionId::new(id),
            Answer::Scalar(ScalarAnswer::Note(value.into())),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn answers_are_scoped_by_module() {
        let repo = InMemoryRepository::new();
        repo.upsert_answer(&scope("env"), &note("Q1", "a")).await.unwrap();

        assert!(
            repo.get_answer(&scope("env"), &QuestionId::new("Q1"))
                .await
                .unwrap()
                .is_some()
        );
        assert!(repo.load_answers(&scope("social")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_plant_id_under_another_company_is_a_separate_scope() {
        let repo = InMemoryRepository::new();
        repo.upsert_answer(&scope("env"), &note("Q1", "a")).await.unwrap();

        let other = AnswerScope {
            company_id: CompanyId::new("c2"),
            ..scope("env")
        };
        assert!(repo.load_answers(&other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_drops_stale_answers() {
        let repo = InMemoryRepository::new();
        let s = scope("env");
        repo.upsert_answer(&s, &note("Q1", "a")).await.unwrap();
        repo.replace_answers(&s, &[note("Q2", "b")]).await.unwrap();

        let store = repo.load_answers(&s).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(&QuestionId::new("Q1")).is_none());
    }

    #[tokio::test]
    async fn session_and_question_cache_round_trip() {
        let storage = Storage::in_memory();
        assert!(storage.sessions.load_session().await.unwrap().is_none());

        let ctx = SessionContext {
            financial_year: Some(FinancialYear::starting(2024)),
            ..SessionContext::default()
        };
        storage.sessions.save_session(&ctx).await.unwrap();
        assert_eq!(storage.sessions.load_session().await.unwrap(), Some(ctx));
        storage.sessions.clear_session().await.unwrap();
        assert!(storage.sessions.load_session().await.unwrap().is_none());

        let active = ActiveQuestion {
            question_id: QuestionId::new("Q5"),
            module_id: ModuleId::new("env"),
            text: "Water withdrawal".into(),
            guidance: String::new(),
            question_type: QuestionType::Table,
            current_answer: None,
        };
        storage.question_cache.put_question(&active).await.unwrap();
        assert_eq!(
            storage
                .question_cache
                .get_question(&QuestionId::new("Q5"))
                .await
                .unwrap(),
            Some(active)
        );
    }
}
