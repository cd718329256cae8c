// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::learning_log::{LearningLog, NewLearningLog},
    store::{Grader, QuizStore, SubmitOutcome},
};

/// Process-local `QuizStore`. Nothing survives a restart; used for tests
/// and for running the service without a database.
#[derive(Default)]
pub struct MemoryQuizStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i64,
    logs: HashMap<i64, LearningLog>,
}

impl MemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn insert(&self, log: NewLearningLog) -> Result<LearningLog, AppError> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;

        let stored = LearningLog {
            id: inner.last_id,
            student_id: log.student_id,
            topic: log.topic,
            level: log.level,
            explanation: log.explanation,
            quiz: log.quiz,
            user_answers: None,
            quiz_score: 0,
            created_at: chrono::Utc::now(),
            submitted_at: None,
        };
        inner.logs.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn find_owned(&self, id: i64, student_id: i64) -> Result<Option<LearningLog>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .logs
            .get(&id)
            .filter(|log| log.student_id == student_id)
            .cloned())
    }

    async fn list_recent(&self, student_id: i64, limit: i64) -> Result<Vec<LearningLog>, AppError> {
        let inner = self.inner.lock().await;
        let mut logs: Vec<LearningLog> = inner
            .logs
            .values()
            .filter(|log| log.student_id == student_id)
            .cloned()
            .collect();

        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        logs.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(logs)
    }

    async fn submit(&self, id: i64, student_id: i64, grade: Grader<'_>) -> Result<SubmitOutcome, AppError> {
        // Lock held across grading so duplicate submissions serialize.
        let mut inner = self.inner.lock().await;

        let Some(log) = inner
            .logs
            .get_mut(&id)
            .filter(|log| log.student_id == student_id)
        else {
            return Ok(SubmitOutcome::NotFound);
        };

        if log.submitted_at.is_some() {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let submission = grade(&*log);
        log.user_answers = Some(submission.user_answers);
        log.quiz_score = submission.score;
        log.submitted_at = Some(chrono::Utc::now());

        Ok(SubmitOutcome::Graded(log.clone()))
    }
}
