// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::learning_log::{LearningLog, NewLearningLog},
    store::{Grader, QuizStore, SubmitOutcome},
};

const LOG_COLUMNS: &str = "id, student_id, topic, level, explanation, quiz, user_answers, \
                           quiz_score, created_at, submitted_at";

/// `QuizStore` backed by the `learning_logs` table.
#[derive(Clone)]
pub struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn insert(&self, log: NewLearningLog) -> Result<LearningLog, AppError> {
        let sql = format!(
            r#"
            INSERT INTO learning_logs (student_id, topic, level, explanation, quiz)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            LOG_COLUMNS
        );

        sqlx::query_as::<_, LearningLog>(&sql)
            .bind(log.student_id)
            .bind(&log.topic)
            .bind(&log.level)
            .bind(&log.explanation)
            .bind(&log.quiz)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert learning log: {:?}", e);
                AppError::from(e)
            })
    }

    async fn find_owned(&self, id: i64, student_id: i64) -> Result<Option<LearningLog>, AppError> {
        let sql = format!(
            "SELECT {} FROM learning_logs WHERE id = $1 AND student_id = $2",
            LOG_COLUMNS
        );

        let log = sqlx::query_as::<_, LearningLog>(&sql)
            .bind(id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(log)
    }

    async fn list_recent(&self, student_id: i64, limit: i64) -> Result<Vec<LearningLog>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM learning_logs
            WHERE student_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            LOG_COLUMNS
        );

        sqlx::query_as::<_, LearningLog>(&sql)
            .bind(student_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch learning logs: {:?}", e);
                AppError::from(e)
            })
    }

    async fn submit(&self, id: i64, student_id: i64, grade: Grader<'_>) -> Result<SubmitOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent submission waits here and then sees submitted_at set.
        let select = format!(
            "SELECT {} FROM learning_logs WHERE id = $1 AND student_id = $2 FOR UPDATE",
            LOG_COLUMNS
        );
        let existing = sqlx::query_as::<_, LearningLog>(&select)
            .bind(id)
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(log) = existing else {
            return Ok(SubmitOutcome::NotFound);
        };

        if log.submitted_at.is_some() {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        let submission = grade(&log);

        let update = format!(
            r#"
            UPDATE learning_logs
            SET user_answers = $1, quiz_score = $2, submitted_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING {}
            "#,
            LOG_COLUMNS
        );
        let updated = sqlx::query_as::<_, LearningLog>(&update)
            .bind(&submission.user_answers)
            .bind(submission.score)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to store quiz submission: {:?}", e);
                AppError::from(e)
            })?;

        tx.commit().await?;

        Ok(SubmitOutcome::Graded(updated))
    }
}
