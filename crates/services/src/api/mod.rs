//! Backend REST contract as consumed by the services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use brsr_core::model::{
    CompanyId, FinancialYear, Module, ModuleId, NewPlant, Plant, PlantId, Question, QuestionId,
    QuestionType,
};
use brsr_core::payload::SaveRoute;

use crate::error::ApiError;

mod http;

pub use http::HttpReportApi;

/// Result of `POST /auth/login`.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    pub email: String,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
}

/// Which answer set to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerQuery {
    pub module_id: ModuleId,
    pub company_id: CompanyId,
    pub plant_id: PlantId,
    pub financial_year: FinancialYear,
}

/// Body of the answer mutations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitAnswer {
    pub module_id: ModuleId,
    pub company_id: CompanyId,
    pub plant_id: PlantId,
    pub financial_year: FinancialYear,
    pub question_id: QuestionId,
    pub question_type: QuestionType,
    pub answer: Value,
}

/// An answer as the backend returns it; `answer` is in one of the wire dialects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WireAnswer {
    pub question_id: QuestionId,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    #[serde(default)]
    pub answer: Value,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the environment-report listing for a plant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentReport {
    pub id: String,
    pub module_id: ModuleId,
    pub name: String,
    pub financial_year: FinancialYear,
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend operations used by the services; the HTTP client implements it and
/// tests swap in fakes.
#[async_trait]
pub trait ReportApi: Send + Sync {
    /// Install (or clear) the bearer token used for later requests.
    fn set_token(&self, token: Option<String>);

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn list_plants(&self, company_id: &CompanyId) -> Result<Vec<Plant>, ApiError>;

    async fn create_plant(&self, plant: &NewPlant) -> Result<Plant, ApiError>;

    async fn fetch_module(&self, module_id: &ModuleId) -> Result<Module, ApiError>;

    async fn fetch_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, ApiError>;

    async fn fetch_answers(&self, query: &AnswerQuery) -> Result<Vec<WireAnswer>, ApiError>;

    async fn submit_answer(
        &self,
        route: SaveRoute,
        request: &SubmitAnswer,
    ) -> Result<WireAnswer, ApiError>;

    async fn list_environment_reports(
        &self,
        plant_id: &PlantId,
        financial_year: FinancialYear,
    ) -> Result<Vec<EnvironmentReport>, ApiError>;
}
