//! Progress aggregation across module -> submodule -> category -> question.
//!
//! Each aggregation call owns its own seen-set:
//!
//! * a category counts each of its question ids once,
//! * a submodule is the sum of its categories, so an id listed in two of its
//!   categories is counted twice,
//! * a module counts every id once no matter how many categories list it.

use std::collections::HashSet;
use std::ops::Add;

use crate::model::{
    AnswerStore, Category, CategoryId, Module, ModuleId, QuestionId, Submodule, SubmoduleId,
};

/// `{total, answered}` for one level of the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub answered: usize,
}

impl Progress {
    #[must_use]
    pub fn new(total: usize, answered: usize) -> Self {
        debug_assert!(answered <= total);
        Self { total, answered }
    }

    fn record(&mut self, answered: bool) {
        self.total += 1;
        if answered {
            self.answered += 1;
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }

    /// Rounded completion percentage; 0 for an empty level.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = (self.answered.min(self.total) * 100 + self.total / 2) / self.total;
        u8::try_from(pct).unwrap_or(100)
    }

    /// Completion ratio in `[0, 1]`; 0 for an empty level.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.answered as f64 / self.total as f64;
        ratio
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }
}

impl Add for Progress {
    type Output = Progress;

    fn add(self, rhs: Self) -> Self::Output {
        Progress {
            total: self.total + rhs.total,
            answered: self.answered + rhs.answered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProgress {
    pub id: CategoryId,
    pub name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleProgress {
    pub id: SubmoduleId,
    pub name: String,
    pub progress: Progress,
    pub categories: Vec<CategoryProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    pub id: ModuleId,
    pub name: String,
    pub progress: Progress,
    pub submodules: Vec<SubmoduleProgress>,
}

fn count_unique<'a>(
    ids: impl IntoIterator<Item = &'a QuestionId>,
    answers: &AnswerStore,
) -> Progress {
    let mut seen: HashSet<&QuestionId> = HashSet::new();
    let mut progress = Progress::default();
    for id in ids {
        if seen.insert(id) {
            progress.record(answers.is_answered(id));
        }
    }
    progress
}

/// Progress of a single category (loaded or pending).
#[must_use]
pub fn category_progress(category: &Category, answers: &AnswerStore) -> CategoryProgress {
    let ids = category.question_ids();
    CategoryProgress {
        id: category.id.clone(),
        name: category.name.clone(),
        progress: count_unique(&ids, answers),
    }
}

#[must_use]
pub fn submodule_progress(submodule: &Submodule, answers: &AnswerStore) -> SubmoduleProgress {
    let categories: Vec<CategoryProgress> = submodule
        .categories
        .iter()
        .map(|c| category_progress(c, answers))
        .collect();
    let progress = categories
        .iter()
        .fold(Progress::default(), |acc, c| acc + c.progress);

    SubmoduleProgress {
        id: submodule.id.clone(),
        name: submodule.name.clone(),
        progress,
        categories,
    }
}

/// Progress of the whole module plus every submodule and category.
#[must_use]
pub fn module_progress(module: &Module, answers: &AnswerStore) -> ModuleProgress {
    let ids: Vec<QuestionId> = module.categories().flat_map(Category::question_ids).collect();
    let progress = count_unique(&ids, answers);

    ModuleProgress {
        id: module.id.clone(),
        name: module.name.clone(),
        progress,
        submodules: module
            .submodules
            .iter()
            .map(|s| submodule_progress(s, answers))
            .collect(),
    }
}
