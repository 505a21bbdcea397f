use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::financial_year::FinancialYear;
use crate::model::ids::{CategoryId, CompanyId, ModuleId, PlantId, QuestionId, SubmoduleId};
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HierarchyError {
    #[error("category {category} is missing fetched questions: {missing:?}")]
    MissingQuestions {
        category: CategoryId,
        missing: Vec<QuestionId>,
    },

    #[error("category {0} not found")]
    UnknownCategory(CategoryId),
}

//
// ─── SCOPE ─────────────────────────────────────────────────────────────────────
//

/// Which answer set a module is being filled for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportScope {
    pub company_id: CompanyId,
    pub plant_id: PlantId,
    pub financial_year: FinancialYear,
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Questions of a category: either loaded, or only referenced by id until the
/// category is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryQuestions {
    Loaded { questions: Vec<Question> },
    Pending { question_ids: Vec<QuestionId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(flatten)]
    pub questions: CategoryQuestions,
}

impl Category {
    #[must_use]
    pub fn pending(id: CategoryId, name: impl Into<String>, ids: Vec<QuestionId>) -> Self {
        Self {
            id,
            name: name.into(),
            questions: CategoryQuestions::Pending { question_ids: ids },
        }
    }

    #[must_use]
    pub fn loaded(id: CategoryId, name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id,
            name: name.into(),
            questions: CategoryQuestions::Loaded { questions },
        }
    }

    /// Ids referenced by this category, in declaration order.
    #[must_use]
    pub fn question_ids(&self) -> Vec<QuestionId> {
        match &self.questions {
            CategoryQuestions::Loaded { questions } => {
                questions.iter().map(|q| q.id().clone()).collect()
            }
            CategoryQuestions::Pending { question_ids } => question_ids.clone(),
        }
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.questions, CategoryQuestions::Loaded { .. })
    }

    #[must_use]
    pub fn loaded_questions(&self) -> Option<&[Question]> {
        match &self.questions {
            CategoryQuestions::Loaded { questions } => Some(questions),
            CategoryQuestions::Pending { .. } => None,
        }
    }

    /// Replace pending ids with a fetched batch.
    ///
    /// Every referenced id must be present in `fetched`; extra questions are
    /// ignored and the result keeps the referenced order. On error the
    /// category is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `HierarchyError::MissingQuestions` listing the ids the batch
    /// did not contain.
    pub fn resolve(&mut self, fetched: Vec<Question>) -> Result<(), HierarchyError> {
        let ids = self.question_ids();
        let by_id: HashMap<QuestionId, Question> = fetched
            .into_iter()
            .map(|q| (q.id().clone(), q))
            .collect();

        let missing: Vec<QuestionId> = ids
            .iter()
            .filter(|id| !by_id.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(HierarchyError::MissingQuestions {
                category: self.id.clone(),
                missing,
            });
        }

        let mut questions = Vec::with_capacity(ids.len());
        for id in &ids {
            // A category may list the same id twice; keep both slots.
            if let Some(q) = by_id.get(id) {
                questions.push(q.clone());
            }
        }

        self.questions = CategoryQuestions::Loaded { questions };
        Ok(())
    }
}

//
// ─── SUBMODULE / MODULE ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submodule {
    pub id: SubmoduleId,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    #[serde(default)]
    pub submodules: Vec<Submodule>,
}

impl Module {
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.submodules.iter().flat_map(|s| s.categories.iter())
    }

    #[must_use]
    pub fn category_mut(&mut self, id: &CategoryId) -> Option<&mut Category> {
        self.submodules
            .iter_mut()
            .flat_map(|s| s.categories.iter_mut())
            .find(|c| &c.id == id)
    }

    /// Find a loaded question anywhere in the module.
    #[must_use]
    pub fn find_question(&self, id: &QuestionId) -> Option<&Question> {
        self.categories()
            .filter_map(Category::loaded_questions)
            .flatten()
            .find(|q| q.id() == id)
    }
}
