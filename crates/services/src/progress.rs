use std::sync::Arc;

use tracing::{debug, info};

use brsr_core::model::{CategoryId, HierarchyError, Module, ModuleId};
use brsr_core::progress::{self, ModuleProgress};
use storage::repository::{AnswerRepository, AnswerScope};

use crate::api::ReportApi;
use crate::error::ProgressError;

/// Loads module trees on demand and computes completion over them.
pub struct ProgressService {
    api: Arc<dyn ReportApi>,
    answers: Arc<dyn AnswerRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(api: Arc<dyn ReportApi>, answers: Arc<dyn AnswerRepository>) -> Self {
        Self { api, answers }
    }

    /// Fetch a module tree. Categories may come back with question ids only.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Api` if the request fails.
    pub async fn load_module(&self, module_id: &ModuleId) -> Result<Module, ProgressError> {
        let module = self.api.fetch_module(module_id).await?;
        debug!(
            %module_id,
            submodules = module.submodules.len(),
            "module loaded"
        );
        Ok(module)
    }

    /// Batch-fetch the questions of one pending category and attach them.
    ///
    /// Loaded categories are left alone.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Hierarchy` for an unknown category or when the
    /// fetched questions do not cover every referenced id, and
    /// `ProgressError::Api` if the request fails.
    pub async fn expand_category(
        &self,
        module: &mut Module,
        category_id: &CategoryId,
    ) -> Result<(), ProgressError> {
        let category = module
            .category_mut(category_id)
            .ok_or_else(|| HierarchyError::UnknownCategory(category_id.clone()))?;
        if category.is_loaded() {
            return Ok(());
        }

        let ids = category.question_ids();
        let fetched = self.api.fetch_questions(&ids).await?;
        category.resolve(fetched)?;
        debug!(%category_id, questions = ids.len(), "category expanded");
        Ok(())
    }

    /// Expand every pending category of a module.
    ///
    /// # Errors
    ///
    /// Stops at the first category that fails to expand.
    pub async fn expand_all(&self, module: &mut Module) -> Result<(), ProgressError> {
        let pending: Vec<CategoryId> = module
            .categories()
            .filter(|c| !c.is_loaded())
            .map(|c| c.id.clone())
            .collect();
        for category_id in &pending {
            self.expand_category(module, category_id).await?;
        }
        Ok(())
    }

    /// Completion of `module` against the locally stored answers.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the answers cannot be read.
    pub async fn module_progress(
        &self,
        module: &Module,
        scope: &AnswerScope,
    ) -> Result<ModuleProgress, ProgressError> {
        let answers = self.answers.load_answers(scope).await?;
        let summary = progress::module_progress(module, &answers);
        info!(
            module_id = %summary.id,
            answered = summary.progress.answered,
            total = summary.progress.total,
            "progress computed"
        );
        Ok(summary)
    }
}
