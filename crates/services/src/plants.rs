use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use brsr_core::model::{CompanyId, FinancialYear, Plant, PlantDraft};

use crate::api::{EnvironmentReport, ReportApi};
use crate::error::PlantServiceError;
use crate::session::SessionService;

/// Lists and creates plants for the session's company.
pub struct PlantService {
    api: Arc<dyn ReportApi>,
    session: Arc<SessionService>,
    cache: Mutex<HashMap<CompanyId, Vec<Plant>>>,
}

impl PlantService {
    #[must_use]
    pub fn new(api: Arc<dyn ReportApi>, session: Arc<SessionService>) -> Self {
        Self {
            api,
            session,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Plants of the session's company, served from cache after the first call.
    ///
    /// # Errors
    ///
    /// Returns `PlantServiceError::MissingContext` without a company, or an
    /// API error.
    pub async fn list(&self) -> Result<Vec<Plant>, PlantServiceError> {
        let company_id = self.session.require_company().await?;
        if let Some(cached) = self.cache.lock().await.get(&company_id) {
            return Ok(cached.clone());
        }

        let plants = self.api.list_plants(&company_id).await?;
        debug!(%company_id, count = plants.len(), "plants fetched");
        self.cache
            .lock()
            .await
            .insert(company_id, plants.clone());
        Ok(plants)
    }

    /// Validate and create a plant, then drop the cached list.
    ///
    /// # Errors
    ///
    /// Returns `PlantServiceError::Plant` for an invalid draft (nothing is
    /// sent), `MissingContext` without a company, or an API error.
    pub async fn create(&self, draft: PlantDraft) -> Result<Plant, PlantServiceError> {
        let company_id = match draft.company_id.clone() {
            Some(id) => id,
            None => self.session.require_company().await?,
        };
        let new_plant = draft.validate(company_id)?;
        let plant = self.api.create_plant(&new_plant).await?;
        self.cache.lock().await.remove(&new_plant.company_id);
        info!(company_id = %new_plant.company_id, code = %plant.code, "plant created; cache invalidated");
        Ok(plant)
    }

    /// The company's main plant, if one exists.
    ///
    /// # Errors
    ///
    /// Same as [`PlantService::list`].
    pub async fn main_plant(&self) -> Result<Option<Plant>, PlantServiceError> {
        Ok(self.list().await?.into_iter().find(Plant::is_main))
    }

    /// Environment reports already started for one plant.
    ///
    /// # Errors
    ///
    /// Returns an API error if the request fails.
    pub async fn environment_reports(
        &self,
        plant: &Plant,
        financial_year: FinancialYear,
    ) -> Result<Vec<EnvironmentReport>, PlantServiceError> {
        Ok(self
            .api
            .list_environment_reports(&plant.id, financial_year)
            .await?)
    }
}
