use std::sync::Arc;

use reqwest::Client;
use storage::repository::Storage;

use crate::Clock;
use crate::answers::AnswerService;
use crate::api::{HttpReportApi, ReportApi};
use crate::assistant::{AssistantConfig, AssistantService};
use crate::config::ApiConfig;
use crate::error::AppServicesError;
use crate::plants::PlantService;
use crate::progress::ProgressService;
use crate::rag::RagService;
use crate::session::SessionService;

/// Assembles app-facing services over one storage backend and one API client.
#[derive(Clone)]
pub struct AppServices {
    session: Arc<SessionService>,
    answers: Arc<AnswerService>,
    progress: Arc<ProgressService>,
    plants: Arc<PlantService>,
    assistant: Arc<AssistantService>,
    rag: Arc<RagService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP backend, and
    /// restore the persisted session.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage, the HTTP client, or session
    /// restore fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: &ApiConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn ReportApi> = Arc::new(HttpReportApi::new(config)?);
        let client = Client::builder().timeout(config.timeout).build()?;
        let services = Self::with_parts(
            storage,
            api,
            clock,
            AssistantService::new(client.clone(), Some(AssistantConfig::from_api(config))),
            RagService::new(client, config),
        );
        services.session.restore().await?;
        Ok(services)
    }

    /// Wire services from already-built parts; used by tests with in-memory
    /// storage and fake APIs.
    #[must_use]
    pub fn with_parts(
        storage: Storage,
        api: Arc<dyn ReportApi>,
        clock: Clock,
        assistant: AssistantService,
        rag: RagService,
    ) -> Self {
        let session = Arc::new(SessionService::new(
            clock,
            Arc::clone(&api),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.question_cache),
        ));
        let answers = Arc::new(AnswerService::new(
            clock,
            Arc::clone(&api),
            Arc::clone(&storage.answers),
            Arc::clone(&session),
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&api),
            Arc::clone(&storage.answers),
        ));
        let plants = Arc::new(PlantService::new(Arc::clone(&api), Arc::clone(&session)));

        Self {
            session,
            answers,
            progress,
            plants,
            assistant: Arc::new(assistant),
            rag: Arc::new(rag),
        }
    }

    #[must_use]
    pub fn session(&self) -> Arc<SessionService> {
        Arc::clone(&self.session)
    }

    #[must_use]
    pub fn answers(&self) -> Arc<AnswerService> {
        Arc::clone(&self.answers)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn plants(&self) -> Arc<PlantService> {
        Arc::clone(&self.plants)
    }

    #[must_use]
    pub fn assistant(&self) -> Arc<AssistantService> {
        Arc::clone(&self.assistant)
    }

    #[must_use]
    pub fn rag(&self) -> Arc<RagService> {
        Arc::clone(&self.rag)
    }
}
