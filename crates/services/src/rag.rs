//! Client for the document service: upload a file, then ask questions or
//! extract table values grounded in it.

use std::fmt;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use brsr_core::model::QuestionMetadata;

use crate::config::{ApiConfig, endpoint};
use crate::error::RagError;

/// Identifier the document service assigns to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values proposed for a table question from an uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableSuggestion {
    #[serde(default)]
    pub suggested_values: Vec<Map<String, Value>>,
    #[serde(default)]
    pub unit_warnings: Vec<String>,
}

#[derive(Clone)]
pub struct RagService {
    client: Client,
    base_url: Option<Url>,
    api_token: Option<String>,
}

impl RagService {
    #[must_use]
    pub fn new(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            base_url: config.rag_base_url.clone(),
            api_token: config.api_token.clone(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.base_url.is_some()
    }

    /// Upload a document for later questions.
    ///
    /// # Errors
    ///
    /// Returns `RagError::Disabled` without a configured service, or a
    /// transport/status error, or `MissingField("file_id")`.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<FileId, RagError> {
        let part = Part::bytes(bytes).file_name(file_name.to_owned());
        let form = Form::new().part("file", part);
        let request = self.client.post(self.url("/upload")?).multipart(form);
        debug!(file_name, "upload document");

        let body: UploadResponse = self.send(request).await?;
        body.file_id
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or(RagError::MissingField("file_id"))
    }

    /// Ask a free-text question about an uploaded document.
    ///
    /// # Errors
    ///
    /// Returns `RagError` for a disabled service, transport failures, or a
    /// reply without `response`.
    pub async fn chat(&self, file_id: &FileId, question: &str) -> Result<String, RagError> {
        let request = self
            .client
            .post(self.url("/chat")?)
            .json(&ChatRequest { file_id, question });
        debug!(%file_id, "document chat");

        let body: ChatResponse = self.send(request).await?;
        body.response.ok_or(RagError::MissingField("response"))
    }

    /// Ask the service to fill a table question from an uploaded document.
    ///
    /// # Errors
    ///
    /// Returns `RagError` for a disabled service or transport failures.
    pub async fn extract_table(
        &self,
        file_id: &FileId,
        table_metadata: &QuestionMetadata,
        question: &str,
    ) -> Result<TableSuggestion, RagError> {
        let request = self
            .client
            .post(self.url("/extract-table")?)
            .json(&ExtractRequest {
                file_id,
                table_metadata,
                question,
            });
        debug!(%file_id, columns = table_metadata.columns.len(), "extract table");
        self.send(request).await
    }

    fn url(&self, route: &str) -> Result<String, RagError> {
        let base = self.base_url.as_ref().ok_or(RagError::Disabled)?;
        Ok(endpoint(base, route))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RagError> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RagError::HttpStatus(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    file_id: Option<FileId>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    file_id: &'a FileId,
    question: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    file_id: &'a FileId,
    table_metadata: &'a QuestionMetadata,
    question: &'a str,
}
