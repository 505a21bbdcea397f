use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use brsr_core::model::{
    CompanyId, FinancialYear, Module, ModuleId, NewPlant, Plant, PlantId, Question, QuestionId,
};
use brsr_core::payload::SaveRoute;

use super::{AnswerQuery, EnvironmentReport, LoginResponse, ReportApi, SubmitAnswer, WireAnswer};
use crate::config::{ApiConfig, endpoint};
use crate::error::ApiError;

/// Lists come back either bare (`[...]`) or wrapped in an object under the
/// resource's key (`{"plants": [...], "count": 3}`) or under `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped(Map<String, Value>),
}

impl<T: DeserializeOwned> Listing<T> {
    fn into_vec(self, key: &str) -> Result<Vec<T>, ApiError> {
        let mut map = match self {
            Listing::Bare(items) => return Ok(items),
            Listing::Wrapped(map) => map,
        };
        let items = map
            .remove(key)
            .or_else(|| map.remove("data"))
            .ok_or_else(|| ApiError::Decode(format!("expected a `{key}` list")))?;
        serde_json::from_value(items)
            .map_err(|err| ApiError::Decode(format!("`{key}` list: {err}")))
    }
}

/// reqwest-backed `ReportApi`.
pub struct HttpReportApi {
    client: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl HttpReportApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: RwLock::new(config.api_token.clone()),
        })
    }

    fn url(&self, route: &str) -> String {
        endpoint(&self.base_url, route)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.token.read().ok().and_then(|guard| guard.clone());
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus { status, body });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ReportApi for HttpReportApi {
    fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token;
        }
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        debug!(email, "login");
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.send(request).await
    }

    async fn list_plants(&self, company_id: &CompanyId) -> Result<Vec<Plant>, ApiError> {
        debug!(%company_id, "list plants");
        let request = self
            .client
            .get(self.url(&format!("/companies/{company_id}/plants")));
        self.send::<Listing<Plant>>(request)
            .await?
            .into_vec("plants")
    }

    async fn create_plant(&self, plant: &NewPlant) -> Result<Plant, ApiError> {
        debug!(company_id = %plant.company_id, code = %plant.plant_code, "create plant");
        let request = self
            .client
            .post(self.url(&format!("/companies/{}/plants", plant.company_id)))
            .json(plant);
        self.send(request).await
    }

    async fn fetch_module(&self, module_id: &ModuleId) -> Result<Module, ApiError> {
        debug!(%module_id, "fetch module");
        let request = self.client.get(self.url(&format!("/modules/{module_id}")));
        self.send(request).await
    }

    async fn fetch_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = ids.len(), "fetch question batch");
        let request = self
            .client
            .post(self.url("/questions/batch"))
            .json(&json!({ "question_ids": ids }));
        self.send::<Listing<Question>>(request)
            .await?
            .into_vec("questions")
    }

    async fn fetch_answers(&self, query: &AnswerQuery) -> Result<Vec<WireAnswer>, ApiError> {
        debug!(module_id = %query.module_id, plant_id = %query.plant_id, "fetch answers");
        let request = self
            .client
            .get(self.url(&format!("/modules/{}/answers", query.module_id)))
            .query(&[
                ("company_id", query.company_id.to_string()),
                ("plant_id", query.plant_id.to_string()),
                ("financial_year", query.financial_year.to_string()),
            ]);
        self.send::<Listing<WireAnswer>>(request)
            .await?
            .into_vec("answers")
    }

    async fn submit_answer(
        &self,
        route: SaveRoute,
        request: &SubmitAnswer,
    ) -> Result<WireAnswer, ApiError> {
        let base = format!("/modules/{}/answers", request.module_id);
        debug!(question_id = %request.question_id, ?route, "submit answer");
        let builder = match route {
            SaveRoute::Table => self.client.put(self.url(&format!("{base}/table"))),
            SaveRoute::Subjective => self.client.put(self.url(&format!("{base}/subjective"))),
            SaveRoute::Generic => self.client.post(self.url(&base)),
        };
        self.send(builder.json(request)).await
    }

    async fn list_environment_reports(
        &self,
        plant_id: &PlantId,
        financial_year: FinancialYear,
    ) -> Result<Vec<EnvironmentReport>, ApiError> {
        debug!(%plant_id, %financial_year, "list environment reports");
        let request = self
            .client
            .get(self.url(&format!("/plants/{plant_id}/environment-reports")))
            .query(&[("financial_year", financial_year.to_string())]);
        self.send::<Listing<EnvironmentReport>>(request)
            .await?
            .into_vec("reports")
    }
}
