mod answer;
mod financial_year;
mod hierarchy;
mod ids;
mod plant;
mod question;
mod session;

pub use answer::{Answer, AnswerRecord, AnswerStore, ScalarAnswer, SubjectiveAnswer, TableAnswer, TableRow};
pub use financial_year::{FinancialYear, FinancialYearError};
pub use hierarchy::{
    Category, CategoryQuestions, HierarchyError, Module, ReportScope, Submodule,
};
pub use ids::{CategoryId, CompanyId, ModuleId, ParseIdError, PlantId, QuestionId, SubmoduleId};
pub use plant::{MAIN_PLANT_CODES, NewPlant, Plant, PlantDraft, PlantError};
pub use question::{
    FieldKind, PROVISIONS_FIELD, Question, QuestionMetadata, QuestionType, SubField, TableColumn,
    TableRowSpec,
};
pub use session::{ActiveQuestion, SessionContext, UserSession};
