use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use brsr_core::model::{
    Answer, AnswerRecord, AnswerStore, Module, ModuleId, PlantId, Question, QuestionId,
    QuestionType, ReportScope,
};
use brsr_core::payload::SaveRoute;
use brsr_core::validation::{self, AnswerForm};
use storage::repository::{AnswerRepository, AnswerScope};

use crate::Clock;
use crate::api::{AnswerQuery, ReportApi, SubmitAnswer, WireAnswer};
use crate::error::{MissingContext, SaveError};
use crate::scope::ScopeToken;
use crate::session::SessionService;

/// Where a save lands. Either part may be unknown when the form is opened
/// outside a fully selected module/plant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveTarget {
    pub module_id: Option<ModuleId>,
    pub plant_id: Option<PlantId>,
}

impl SaveTarget {
    #[must_use]
    pub fn new(module_id: ModuleId, plant_id: PlantId) -> Self {
        Self {
            module_id: Some(module_id),
            plant_id: Some(plant_id),
        }
    }
}

/// Saves answers to the backend and reconciles the local answer store.
pub struct AnswerService {
    clock: Clock,
    api: Arc<dyn ReportApi>,
    answers: Arc<dyn AnswerRepository>,
    session: Arc<SessionService>,
    in_flight: Mutex<HashSet<QuestionId>>,
}

/// Releases the in-flight slot for a question on every exit path.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<QuestionId>>,
    id: QuestionId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<QuestionId>>, id: &QuestionId) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(id.clone()).then(|| Self {
            set,
            id: id.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&self.id);
    }
}

impl AnswerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        api: Arc<dyn ReportApi>,
        answers: Arc<dyn AnswerRepository>,
        session: Arc<SessionService>,
    ) -> Self {
        Self {
            clock,
            api,
            answers,
            session,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Validate, submit and merge one answer.
    ///
    /// # Errors
    ///
    /// See [`AnswerService::save_within`].
    pub async fn save(
        &self,
        target: &SaveTarget,
        question: &Question,
        form: AnswerForm,
    ) -> Result<AnswerRecord, SaveError> {
        self.save_within(&ScopeToken::detached(), target, question, form)
            .await
    }

    /// Validate, submit and merge one answer, discarding the response if
    /// `token` is cancelled before it arrives.
    ///
    /// Context is checked before anything else, in the order module, company,
    /// financial year, plant. Nothing reaches the network unless the form
    /// validates, and the local store only changes after the backend accepts
    /// the answer.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::MissingContext` or `SaveError::Validation` without
    /// contacting the backend, `SaveError::AlreadySaving` when a save for the
    /// same question is still running, `SaveError::Cancelled` when the scope
    /// goes away, and `Api`/`Storage` errors from the round trip.
    pub async fn save_within(
        &self,
        token: &ScopeToken,
        target: &SaveTarget,
        question: &Question,
        form: AnswerForm,
    ) -> Result<AnswerRecord, SaveError> {
        let question_id = question.id();

        let Some(module_id) = target.module_id.clone() else {
            warn!(%question_id, "save rejected: no module id");
            return Err(MissingContext::ModuleId.into());
        };
        let company_id = self.session.require_company().await.inspect_err(|_| {
            warn!(%question_id, "save rejected: no company id");
        })?;
        let financial_year = self
            .session
            .require_financial_year()
            .await
            .inspect_err(|_| {
                warn!(%question_id, "save rejected: no financial year");
            })?;
        let Some(plant_id) = target.plant_id.clone() else {
            warn!(%question_id, "save rejected: no plant");
            return Err(MissingContext::Plant.into());
        };

        if let Err(errors) = validation::validate(question, &form) {
            warn!(%question_id, %errors, "save rejected: invalid answer");
            return Err(SaveError::Validation(errors));
        }

        let _slot = InFlight::acquire(&self.in_flight, question_id)
            .ok_or_else(|| SaveError::AlreadySaving(question_id.clone()))?;

        let local = form.into_answer(question)?;
        let request = SubmitAnswer {
            module_id: module_id.clone(),
            company_id: company_id.clone(),
            plant_id: plant_id.clone(),
            financial_year,
            question_id: question_id.clone(),
            question_type: question.question_type(),
            answer: local.to_payload(),
        };
        let route = SaveRoute::for_type(question.question_type());

        let response = token
            .run(self.api.submit_answer(route, &request))
            .await
            .map_err(|_| SaveError::Cancelled)??;

        if token.is_cancelled() {
            debug!(%question_id, "save response discarded: scope cancelled");
            return Err(SaveError::Cancelled);
        }

        let merged = authoritative_answer(question.question_type(), &response, local);
        let record = AnswerRecord::new(question_id.clone(), merged, self.clock.now());
        let scope = AnswerScope {
            module_id,
            company_id,
            plant_id,
            financial_year,
        };
        self.answers.upsert_answer(&scope, &record).await?;
        info!(%question_id, ?route, "answer saved");
        Ok(record)
    }

    /// Replace the local answers of a module with the backend's snapshot.
    ///
    /// `module` supplies question types for parsing; answers whose type is
    /// neither in the tree nor on the wire are interpreted from their shape.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::MissingContext` when no company is known, and
    /// `Api`/`Storage` errors from the round trip.
    pub async fn load(&self, scope: &ReportScope, module: &Module) -> Result<AnswerStore, SaveError> {
        let query = AnswerQuery {
            module_id: module.id.clone(),
            company_id: scope.company_id.clone(),
            plant_id: scope.plant_id.clone(),
            financial_year: scope.financial_year,
        };
        let wire = self.api.fetch_answers(&query).await?;

        let now = self.clock.now();
        let records: Vec<AnswerRecord> = wire
            .into_iter()
            .filter_map(|item| {
                let question_type = module
                    .find_question(&item.question_id)
                    .map(Question::question_type)
                    .or(item.question_type)
                    .unwrap_or_else(|| infer_type(&item.answer));
                match Answer::from_wire(question_type, &item.answer) {
                    Ok(answer) => Some(AnswerRecord::new(
                        item.question_id,
                        answer,
                        item.updated_at.unwrap_or(now),
                    )),
                    Err(err) => {
                        warn!(question_id = %item.question_id, %err, "skipping unreadable answer");
                        None
                    }
                }
            })
            .collect();

        let answer_scope = AnswerScope::new(module.id.clone(), scope);
        self.answers.replace_answers(&answer_scope, &records).await?;
        debug!(module_id = %module.id, count = records.len(), "answers loaded");
        Ok(records.into_iter().collect())
    }

    /// Answers currently held locally for a module.
    ///
    /// # Errors
    ///
    /// Returns `SaveError::Storage` on backend failures.
    pub async fn local(&self, scope: &AnswerScope) -> Result<AnswerStore, SaveError> {
        Ok(self.answers.load_answers(scope).await?)
    }
}

/// The backend's copy of a saved answer wins; an empty or unreadable echo
/// falls back to what was sent.
fn authoritative_answer(question_type: QuestionType, response: &WireAnswer, sent: Answer) -> Answer {
    if response.answer.is_null() {
        return sent;
    }
    match Answer::from_wire(question_type, &response.answer) {
        Ok(answer) => answer,
        Err(err) => {
            warn!(question_id = %response.question_id, %err, "keeping submitted answer");
            sent
        }
    }
}

fn infer_type(value: &Value) -> QuestionType {
    match value {
        Value::Array(_) => QuestionType::Table,
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(_)) => QuestionType::Table,
            Some(Value::Object(_)) => QuestionType::Subjective,
            _ => QuestionType::Note,
        },
        Value::Number(_) => QuestionType::Decimal,
        Value::Bool(_) => QuestionType::Boolean,
        _ => QuestionType::Note,
    }
}
