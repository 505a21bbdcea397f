#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AnswerRepository, AnswerScope, InMemoryRepository, QuestionCacheRepository, SessionRepository,
    Storage, StorageError,
};
