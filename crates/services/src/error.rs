//! Shared error types for the services crate.

use thiserror::Error;

use brsr_core::model::{HierarchyError, PlantError, QuestionId};
use brsr_core::payload::PayloadError;
use brsr_core::validation::ValidationErrors;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {value:?}")]
    InvalidUrl { name: &'static str, value: String },
    #[error("{name} is not a valid number: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Errors emitted by the backend REST client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not logged in")]
    Unauthorized,
    #[error("backend request failed with status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Context a save needs before any network call is made.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MissingContext {
    #[error("Module id is required.")]
    ModuleId,
    #[error("Company id is required.")]
    CompanyId,
    #[error("Financial year is required.")]
    FinancialYear,
    #[error("Plant is required.")]
    Plant,
}

/// Errors emitted by `AnswerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SaveError {
    #[error(transparent)]
    MissingContext(#[from] MissingContext),
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("a save for question {0} is already in progress")]
    AlreadySaving(QuestionId),
    #[error("request was cancelled")]
    Cancelled,
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SaveError {
    /// Field-level messages, when the failure came from validation.
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            SaveError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssistantService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssistantError {
    #[error("the assistant is not configured")]
    Disabled,
    #[error("the assistant returned an empty response")]
    EmptyResponse,
    #[error("assistant request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `RagService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RagError {
    #[error("document service is not configured")]
    Disabled,
    #[error("document service request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("document service returned no {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `PlantService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlantServiceError {
    #[error(transparent)]
    Plant(#[from] PlantError),
    #[error(transparent)]
    MissingContext(#[from] MissingContext),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `SessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}
