use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use brsr_core::model::{
    Answer, CompanyId, FinancialYear, Module, ModuleId, NewPlant, Plant, PlantId, Question,
    QuestionId, QuestionType, ReportScope, ScalarAnswer,
};
use brsr_core::payload::SaveRoute;
use brsr_core::time::fixed_now;
use brsr_core::validation::{AnswerForm, REQUIRED};
use services::api::{
    AnswerQuery, EnvironmentReport, LoginResponse, ReportApi, SubmitAnswer, WireAnswer,
};
use services::{
    ApiError, AnswerService, Clock, MissingContext, SaveError, SaveTarget, SessionService,
    TaskScope,
};
use storage::repository::{AnswerRepository, AnswerScope, InMemoryRepository};

/// In-process backend that records submissions and can hold them open.
#[derive(Default)]
struct FakeApi {
    submitted: Mutex<Vec<(SaveRoute, SubmitAnswer)>>,
    echo: Mutex<Option<Value>>,
    fail_with: Mutex<Option<u16>>,
    hold: Mutex<Option<Arc<Notify>>>,
    started: Notify,
    answers: Mutex<Vec<WireAnswer>>,
}

impl FakeApi {
    fn submissions(&self) -> Vec<(SaveRoute, SubmitAnswer)> {
        self.submitted.lock().unwrap().clone()
    }

    fn hold_submissions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl ReportApi for FakeApi {
    fn set_token(&self, _token: Option<String>) {}

    async fn login(&self, email: &str, _password: &str) -> Result<LoginResponse, ApiError> {
        Ok(LoginResponse {
            token: "token-1".into(),
            email: email.into(),
            company_id: Some(CompanyId::new("c1")),
        })
    }

    async fn list_plants(&self, _company_id: &CompanyId) -> Result<Vec<Plant>, ApiError> {
        Ok(Vec::new())
    }

    async fn create_plant(&self, _plant: &NewPlant) -> Result<Plant, ApiError> {
        Err(ApiError::Decode("unused".into()))
    }

    async fn fetch_module(&self, _module_id: &ModuleId) -> Result<Module, ApiError> {
        Err(ApiError::Decode("unused".into()))
    }

    async fn fetch_questions(&self, _ids: &[QuestionId]) -> Result<Vec<Question>, ApiError> {
        Ok(Vec::new())
    }

    async fn fetch_answers(&self, _query: &AnswerQuery) -> Result<Vec<WireAnswer>, ApiError> {
        Ok(self.answers.lock().unwrap().clone())
    }

    async fn submit_answer(
        &self,
        route: SaveRoute,
        request: &SubmitAnswer,
    ) -> Result<WireAnswer, ApiError> {
        self.submitted
            .lock()
            .unwrap()
            .push((route, request.clone()));
        self.started.notify_one();

        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Err(ApiError::HttpStatus {
                status: reqwest::StatusCode::from_u16(status).unwrap(),
                body: "boom".into(),
            });
        }

        let answer = self
            .echo
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| request.answer.clone());
        Ok(WireAnswer {
            question_id: request.question_id.clone(),
            question_type: Some(request.question_type),
            answer,
            updated_at: None,
        })
    }

    async fn list_environment_reports(
        &self,
        _plant_id: &PlantId,
        _financial_year: FinancialYear,
    ) -> Result<Vec<EnvironmentReport>, ApiError> {
        Ok(Vec::new())
    }
}

struct Harness {
    api: Arc<FakeApi>,
    repo: InMemoryRepository,
    session: Arc<SessionService>,
    answers: Arc<AnswerService>,
}

fn harness() -> Harness {
    let api = Arc::new(FakeApi::default());
    let repo = InMemoryRepository::new();
    let clock = Clock::fixed(fixed_now());
    let session = Arc::new(SessionService::new(
        clock,
        api.clone(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    ));
    let answers = Arc::new(AnswerService::new(
        clock,
        api.clone(),
        Arc::new(repo.clone()),
        Arc::clone(&session),
    ));
    Harness {
        api,
        repo,
        session,
        answers,
    }
}

async fn logged_in_harness() -> Harness {
    let h = harness();
    h.session.login("esg@example.com", "pw").await.unwrap();
    h.session
        .set_financial_year(FinancialYear::starting(2023))
        .await
        .unwrap();
    h
}

fn target() -> SaveTarget {
    SaveTarget::new(ModuleId::new("env"), PlantId::new("P001"))
}

fn answer_scope() -> AnswerScope {
    AnswerScope {
        module_id: ModuleId::new("env"),
        company_id: CompanyId::new("c1"),
        plant_id: PlantId::new("P001"),
        financial_year: FinancialYear::starting(2023),
    }
}

fn decimal_question() -> Question {
    Question::new(QuestionId::new("Q1"), "Energy consumed (GJ)", QuestionType::Decimal)
}

fn decimal_form(raw: &str) -> AnswerForm {
    AnswerForm::Decimal { raw: raw.into() }
}

#[tokio::test]
async fn missing_financial_year_fails_before_network() {
    let h = harness();
    h.session.login("esg@example.com", "pw").await.unwrap();

    let err = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("10"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SaveError::MissingContext(MissingContext::FinancialYear)
    ));
    assert_eq!(err.to_string(), "Financial year is required.");
    assert!(h.api.submissions().is_empty());
}

#[tokio::test]
async fn missing_context_is_checked_in_order() {
    let h = harness();
    let no_module = SaveTarget {
        module_id: None,
        plant_id: Some(PlantId::new("P001")),
    };

    let err = h
        .answers
        .save(&no_module, &decimal_question(), decimal_form("10"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Module id is required.");

    let err = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("10"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Company id is required.");
    assert!(h.api.submissions().is_empty());
}

#[tokio::test]
async fn invalid_form_is_rejected_without_network() {
    let h = logged_in_harness().await;

    let err = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("  "))
        .await
        .unwrap_err();

    let errors = err.validation().expect("validation error");
    assert_eq!(errors.for_field("decimal_value"), Some(REQUIRED));
    assert!(h.api.submissions().is_empty());
    assert!(h.repo.load_answers(&answer_scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_merges_server_answer_into_store() {
    let h = logged_in_harness().await;
    // The backend rounds the figure; its copy replaces the local edit.
    *h.api.echo.lock().unwrap() = Some(json!({ "decimal_value": 1250 }));

    let record = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("1,250.50"))
        .await
        .unwrap();

    assert_eq!(record.answer, Answer::Scalar(ScalarAnswer::Decimal(1250.0)));
    assert_eq!(record.updated_at, fixed_now());

    let submissions = h.api.submissions();
    assert_eq!(submissions.len(), 1);
    let (route, request) = &submissions[0];
    assert_eq!(*route, SaveRoute::Generic);
    assert_eq!(request.company_id, CompanyId::new("c1"));
    assert_eq!(request.financial_year, FinancialYear::starting(2023));
    assert_eq!(request.answer, json!({ "decimal_value": 1250.5 }));

    let stored = h
        .repo
        .get_answer(&answer_scope(), &QuestionId::new("Q1"))
        .await
        .unwrap()
        .expect("merged");
    assert_eq!(stored, record);
}

#[tokio::test]
async fn table_saves_use_table_route_and_drop_blank_rows() {
    let h = logged_in_harness().await;
    let question = Question::new(QuestionId::new("Q9"), "Water withdrawal", QuestionType::Table);
    let rows = vec![
        json!({ "source": "Ground water", "qty": "0.01" })
            .as_object()
            .unwrap()
            .clone(),
        json!({ "source": " ", "qty": null }).as_object().unwrap().clone(),
    ];

    let record = h
        .answers
        .save(&target(), &question, AnswerForm::Table { rows })
        .await
        .unwrap();

    let (route, request) = &h.api.submissions()[0];
    assert_eq!(*route, SaveRoute::Table);
    assert_eq!(request.answer["data"].as_array().map(Vec::len), Some(1));
    assert!(record.answer.is_answered());
}

#[tokio::test]
async fn failed_save_leaves_store_unchanged() {
    let h = logged_in_harness().await;
    *h.api.fail_with.lock().unwrap() = Some(500);

    let err = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("10"))
        .await
        .unwrap_err();

    assert!(matches!(err, SaveError::Api(ApiError::HttpStatus { .. })));
    assert!(h.repo.load_answers(&answer_scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn overlapping_save_for_same_question_is_rejected() {
    let h = logged_in_harness().await;
    let gate = h.api.hold_submissions();

    let answers = Arc::clone(&h.answers);
    let first = tokio::spawn(async move {
        answers
            .save(&target(), &decimal_question(), decimal_form("10"))
            .await
    });
    h.api.started.notified().await;

    let err = h
        .answers
        .save(&target(), &decimal_question(), decimal_form("11"))
        .await
        .unwrap_err();
    assert!(matches!(err, SaveError::AlreadySaving(id) if id == QuestionId::new("Q1")));

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(h.api.submissions().len(), 1);

    *h.api.hold.lock().unwrap() = None;
    h.answers
        .save(&target(), &decimal_question(), decimal_form("12"))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancelled_scope_discards_late_response() {
    let h = logged_in_harness().await;
    let gate = h.api.hold_submissions();
    let scope = TaskScope::new();
    let token = scope.token();

    let answers = Arc::clone(&h.answers);
    let pending = tokio::spawn(async move {
        answers
            .save_within(&token, &target(), &decimal_question(), decimal_form("10"))
            .await
    });
    h.api.started.notified().await;
    drop(scope);
    gate.notify_one();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, SaveError::Cancelled));
    assert!(h.repo.load_answers(&answer_scope()).await.unwrap().is_empty());
}

#[tokio::test]
async fn load_replaces_local_answers() {
    let h = logged_in_harness().await;
    *h.api.answers.lock().unwrap() = vec![
        WireAnswer {
            question_id: QuestionId::new("Q1"),
            question_type: None,
            answer: json!({ "decimal_value": 42 }),
            updated_at: None,
        },
        WireAnswer {
            question_id: QuestionId::new("Q2"),
            question_type: None,
            answer: json!([{ "qty": "0.00" }]),
            updated_at: None,
        },
    ];
    let module = Module {
        id: ModuleId::new("env"),
        name: "Environment".into(),
        submodules: Vec::new(),
    };
    let scope = ReportScope {
        company_id: CompanyId::new("c1"),
        plant_id: PlantId::new("P001"),
        financial_year: FinancialYear::starting(2023),
    };

    let store = h.answers.load(&scope, &module).await.unwrap();

    assert_eq!(store.len(), 2);
    assert!(store.is_answered(&QuestionId::new("Q1")));
    assert!(!store.is_answered(&QuestionId::new("Q2")));
    assert_eq!(h.repo.load_answers(&answer_scope()).await.unwrap(), store);
}
