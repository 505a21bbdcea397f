use std::sync::Arc;

use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brsr_core::model::{
    ActiveQuestion, CompanyId, FinancialYear, ModuleId, PlantId, QuestionId, QuestionMetadata,
    QuestionType,
};
use brsr_core::payload::SaveRoute;
use brsr_core::time::fixed_now;
use services::api::{AnswerQuery, HttpReportApi, ReportApi, SubmitAnswer};
use services::assistant::UNEXPECTED_FORMAT;
use services::{
    ApiConfig, ApiError, AssistantConfig, AssistantReply, AssistantService, Clock, FileId,
    PlantService, RagService, SessionService,
};
use storage::repository::Storage;

fn config(server: &MockServer) -> ApiConfig {
    ApiConfig::with_base_url(&format!("{}/api", server.uri())).unwrap()
}

#[tokio::test]
async fn login_accepts_access_token_alias() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_partial_json(json!({ "email": "esg@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok",
            "email": "esg@example.com",
            "company_id": "c1"
        })))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let login = api.login("esg@example.com", "pw").await.unwrap();
    assert_eq!(login.token, "tok");
    assert_eq!(login.company_id, Some(CompanyId::new("c1")));
}

#[tokio::test]
async fn unauthorized_maps_to_dedicated_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/companies/c1/plants"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let err = api.list_plants(&CompanyId::new("c1")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn wrapped_plant_listing_is_unwrapped_and_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/companies/c1/plants"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plants": [
                { "id": "p1", "company_id": "c1", "plant_code": "C001", "plant_name": "HQ" },
                { "id": "p2", "company_id": "c1", "plant_code": "X-7", "plant_name": "Depot" }
            ]
        })))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    api.set_token(Some("tok".into()));
    let plants = api.list_plants(&CompanyId::new("c1")).await.unwrap();
    assert_eq!(plants.len(), 2);
    assert!(plants[0].is_main());
    assert!(!plants[1].is_main());
}

#[tokio::test]
async fn listing_reads_its_own_key_next_to_counters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/companies/c1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "archived": [
                { "id": "p9", "company_id": "c1", "plant_code": "OLD", "plant_name": "Closed" }
            ],
            "plants": [
                { "id": "p1", "company_id": "c1", "plant_code": "C001", "plant_name": "HQ" }
            ]
        })))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let plants = api.list_plants(&CompanyId::new("c1")).await.unwrap();
    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0].id, PlantId::new("p1"));
}

#[tokio::test]
async fn listing_without_the_expected_key_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/companies/c1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0 })))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let err = api.list_plants(&CompanyId::new("c1")).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn environment_reports_are_listed_per_plant_and_year() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/companies/c1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "p1", "company_id": "c1", "plant_code": "P001", "plant_name": "Main" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/plants/p1/environment-reports"))
        .and(query_param("financial_year", "2023-2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "reports": [{
                "id": "r1",
                "module_id": "env",
                "name": "Environment",
                "financial_year": "2023-2024",
                "status": "draft"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = Arc::new(HttpReportApi::new(&config(&server)).unwrap());
    let storage = Storage::in_memory();
    let session = Arc::new(SessionService::new(
        Clock::fixed(fixed_now()),
        api.clone(),
        Arc::clone(&storage.sessions),
        Arc::clone(&storage.question_cache),
    ));
    session.set_company(CompanyId::new("c1")).await.unwrap();
    let plants = PlantService::new(api, session);

    let main = plants.main_plant().await.unwrap().expect("main plant");
    let reports = plants
        .environment_reports(&main, FinancialYear::starting(2023))
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].module_id, ModuleId::new("env"));
    assert_eq!(reports[0].financial_year, FinancialYear::starting(2023));
    assert_eq!(reports[0].status.as_deref(), Some("draft"));
}

#[tokio::test]
async fn table_answers_use_put_table_route() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/modules/env/answers/table"))
        .and(body_partial_json(json!({
            "question_id": "Q9",
            "financial_year": "2023-2024",
            "answer": { "data": [{ "qty": "5" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "question_id": "Q9",
            "answer": { "data": [{ "qty": "5.00" }] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let request = SubmitAnswer {
        module_id: ModuleId::new("env"),
        company_id: CompanyId::new("c1"),
        plant_id: PlantId::new("P001"),
        financial_year: FinancialYear::starting(2023),
        question_id: QuestionId::new("Q9"),
        question_type: QuestionType::Table,
        answer: json!({ "data": [{ "qty": "5" }] }),
    };
    let echoed = api.submit_answer(SaveRoute::Table, &request).await.unwrap();
    assert_eq!(echoed.answer, json!({ "data": [{ "qty": "5.00" }] }));
}

#[tokio::test]
async fn answers_are_queried_by_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/modules/env/answers"))
        .and(query_param("plant_id", "P001"))
        .and(query_param("financial_year", "2023-2024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "question_id": "Q1", "answer": { "note": "hello" } }
        ])))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let answers = api
        .fetch_answers(&AnswerQuery {
            module_id: ModuleId::new("env"),
            company_id: CompanyId::new("c1"),
            plant_id: PlantId::new("P001"),
            financial_year: FinancialYear::starting(2023),
        })
        .await
        .unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].question_id, QuestionId::new("Q1"));
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/questions/batch"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let api = HttpReportApi::new(&config(&server)).unwrap();
    let err = api
        .fetch_questions(&[QuestionId::new("Q1")])
        .await
        .unwrap_err();
    match err {
        ApiError::HttpStatus { status, body } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn active_question() -> ActiveQuestion {
    ActiveQuestion {
        question_id: QuestionId::new("Q3"),
        module_id: ModuleId::new("env"),
        text: "Do you have an energy policy?".into(),
        guidance: String::new(),
        question_type: QuestionType::Subjective,
        current_answer: None,
    }
}

#[tokio::test]
async fn assistant_parses_fenced_json_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "```json\n{\"answer\": \"Yes, since 2021.\"}\n```"
        })))
        .mount(&server)
        .await;

    let assistant = AssistantService::new(
        Client::new(),
        Some(AssistantConfig::from_api(&config(&server))),
    );
    let reply = assistant.draft_answer(&active_question()).await.unwrap();
    assert_eq!(
        reply.structured(),
        Some(&json!({ "answer": "Yes, since 2021." }))
    );
}

#[tokio::test]
async fn assistant_falls_back_to_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/generate"))
        .and(body_partial_json(json!({ "message": "Summarise" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("We comply with all norms."))
        .mount(&server)
        .await;

    let assistant = AssistantService::new(
        Client::new(),
        Some(AssistantConfig::from_api(&config(&server))),
    );
    let reply = assistant.ask_structured("Summarise", "ctx").await.unwrap();
    assert_eq!(
        reply,
        AssistantReply::Unstructured {
            raw: "We comply with all norms.".into(),
            notice: UNEXPECTED_FORMAT,
        }
    );
}

fn rag(server: &MockServer) -> RagService {
    let mut config = config(server);
    config.rag_base_url = Some(format!("{}/rag", server.uri()).parse().unwrap());
    RagService::new(Client::new(), &config)
}

#[tokio::test]
async fn rag_upload_then_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file_id": "f-42" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rag/chat"))
        .and(body_partial_json(json!({ "file_id": "f-42", "question": "Scope 1?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "1,200 tCO2e" })))
        .mount(&server)
        .await;

    let rag = rag(&server);
    let file_id = rag
        .upload("report.pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    assert_eq!(file_id, FileId::new("f-42"));
    assert_eq!(rag.chat(&file_id, "Scope 1?").await.unwrap(), "1,200 tCO2e");
}

#[tokio::test]
async fn rag_extract_table_returns_suggestions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/extract-table"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "suggested_values": [{ "qty": "12" }],
            "unit_warnings": ["qty reported in MWh, expected GJ"]
        })))
        .mount(&server)
        .await;

    let suggestion = rag(&server)
        .extract_table(&FileId::new("f-42"), &QuestionMetadata::default(), "Energy")
        .await
        .unwrap();
    assert_eq!(suggestion.suggested_values.len(), 1);
    assert_eq!(suggestion.unit_warnings.len(), 1);
}
