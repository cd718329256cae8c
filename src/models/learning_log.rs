// src/models/learning_log.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{models::quiz::QuizPayload, services::grading};

/// Represents the 'learning_logs' table in the database.
/// One row per generated lesson (explanation + quiz) and its eventual submission.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LearningLog {
    pub id: i64,
    pub student_id: i64,
    pub topic: String,
    pub level: String,
    pub explanation: String,

    /// Quiz text exactly as returned by the generation model.
    pub quiz: String,

    /// Raw submitted answers, NULL until submission.
    pub user_answers: Option<String>,

    /// Sentinel 0 until the quiz is submitted. Use `graded_score()` to read it.
    pub quiz_score: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lifecycle of a learning log's quiz. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Created,
    Submitted,
}

impl LearningLog {
    pub fn status(&self) -> QuizStatus {
        if self.submitted_at.is_some() {
            QuizStatus::Submitted
        } else {
            QuizStatus::Created
        }
    }

    /// Score if the quiz has been graded, `None` before submission.
    pub fn graded_score(&self) -> Option<i64> {
        match self.status() {
            QuizStatus::Submitted => Some(self.quiz_score),
            QuizStatus::Created => None,
        }
    }

    pub fn payload(&self) -> QuizPayload {
        grading::to_payload(&self.quiz)
    }
}

/// Insert shape for a freshly generated log.
#[derive(Debug, Clone)]
pub struct NewLearningLog {
    pub student_id: i64,
    pub topic: String,
    pub level: String,
    pub explanation: String,
    pub quiz: String,
}

/// Fields written once when a quiz is graded.
#[derive(Debug, Clone)]
pub struct QuizSubmission {
    pub user_answers: String,
    pub score: i64,
}

/// DTO for requesting an explanation and quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    /// Missing topic deserializes as empty so it is reported as a 400, not a 422.
    #[serde(default, alias = "Topic")]
    #[validate(length(max = 255, message = "Topic must be at most 255 characters."))]
    pub topic: String,

    #[validate(length(max = 64, message = "Level must be at most 64 characters."))]
    pub level: Option<String>,
}

/// DTO returned by the generation endpoint.
#[derive(Debug, Serialize)]
pub struct GenerateQuizResponse {
    pub topic: String,
    pub explanation: String,
    /// Array when the model output parsed, otherwise the raw string.
    pub quiz: QuizPayload,
    pub log_id: i64,
}

impl From<LearningLog> for GenerateQuizResponse {
    fn from(log: LearningLog) -> Self {
        let quiz = log.payload();
        Self {
            topic: log.topic,
            explanation: log.explanation,
            quiz,
            log_id: log.id,
        }
    }
}

/// DTO for submitting quiz answers.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub log_id: i64,

    /// JSON-encoded map `{"1": "B", ...}`. An already-decoded object is also
    /// accepted and re-encoded.
    #[serde(default)]
    pub answers: serde_json::Value,
}

impl SubmitQuizRequest {
    pub fn answers_text(&self) -> String {
        match &self.answers {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitQuizResponse {
    pub message: String,
    pub score: i64,
}

/// Row of the history listing.
#[derive(Debug, Serialize)]
pub struct LearningLogSummary {
    pub id: i64,
    pub topic: String,
    pub level: String,
    pub status: QuizStatus,
    pub score: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&LearningLog> for LearningLogSummary {
    fn from(log: &LearningLog) -> Self {
        Self {
            id: log.id,
            topic: log.topic.clone(),
            level: log.level.clone(),
            status: log.status(),
            score: log.graded_score(),
            created_at: log.created_at,
        }
    }
}

/// Full view of a single learning log.
#[derive(Debug, Serialize)]
pub struct LearningLogDetail {
    pub id: i64,
    pub topic: String,
    pub level: String,
    pub explanation: String,
    pub quiz: QuizPayload,
    pub status: QuizStatus,
    /// Stored score; only a grade when `status` is `submitted`.
    pub score: i64,
    pub user_answers: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<LearningLog> for LearningLogDetail {
    fn from(log: LearningLog) -> Self {
        let quiz = log.payload();
        let status = log.status();
        Self {
            id: log.id,
            topic: log.topic,
            level: log.level,
            explanation: log.explanation,
            quiz,
            status,
            score: log.quiz_score,
            user_answers: log.user_answers,
            created_at: log.created_at,
            submitted_at: log.submitted_at,
        }
    }
}
