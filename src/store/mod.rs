// src/store/mod.rs

//! Persistence of learning logs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::learning_log::{LearningLog, NewLearningLog, QuizSubmission},
};

pub use memory::MemoryQuizStore;
pub use postgres::PgQuizStore;

/// Computes the submission for a locked, not yet submitted log.
pub type Grader<'a> = &'a (dyn Fn(&LearningLog) -> QuizSubmission + Send + Sync);

/// Result of a submission attempt.
#[derive(Debug)]
pub enum SubmitOutcome {
    Graded(LearningLog),
    /// No log with that id belongs to the student.
    NotFound,
    AlreadySubmitted,
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert(&self, log: NewLearningLog) -> Result<LearningLog, AppError>;

    /// Fetches a log only if it belongs to `student_id`.
    async fn find_owned(&self, id: i64, student_id: i64) -> Result<Option<LearningLog>, AppError>;

    /// Most recent logs of a student, newest first.
    async fn list_recent(&self, student_id: i64, limit: i64) -> Result<Vec<LearningLog>, AppError>;

    /// Atomically fetches the owned log, grades it and stores the result once.
    /// Concurrent submissions for the same log are serialized; all but the
    /// first see `AlreadySubmitted`.
    async fn submit(&self, id: i64, student_id: i64, grade: Grader<'_>) -> Result<SubmitOutcome, AppError>;
}
