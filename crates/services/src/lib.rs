#![forbid(unsafe_code)]

pub mod answers;
pub mod api;
pub mod app_services;
pub mod assistant;
pub mod config;
pub mod error;
pub mod plants;
pub mod progress;
pub mod rag;
pub mod scope;
pub mod session;

pub use brsr_core::Clock;

pub use answers::{AnswerService, SaveTarget};
pub use app_services::AppServices;
pub use assistant::{AssistantConfig, AssistantReply, AssistantService};
pub use config::ApiConfig;
pub use error::{
    ApiError, AppServicesError, AssistantError, ConfigError, MissingContext, PlantServiceError,
    ProgressError, RagError, SaveError, SessionError,
};
pub use plants::PlantService;
pub use progress::ProgressService;
pub use rag::{FileId, RagService, TableSuggestion};
pub use scope::{Cancelled, ScopeToken, TaskScope};
pub use session::SessionService;
