// src/handlers/tutor.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::learning_log::{
        GenerateQuizRequest, GenerateQuizResponse, LearningLogDetail, LearningLogSummary,
        SubmitQuizRequest, SubmitQuizResponse,
    },
    services::quiz_pipeline::QuizPipeline,
    utils::jwt::Claims,
};

/// Generates an explanation and a quiz for a topic.
///
/// * Explanation and quiz are two separate model calls; either failing returns 502.
/// * The quiz is returned as an array when the model produced valid JSON,
///   otherwise as the raw text.
pub async fn generate(
    State(pipeline): State<Arc<QuizPipeline>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<GenerateQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.student_id()?;

    let log = pipeline
        .generate_lesson(student_id, &req.topic, req.level.as_deref())
        .await?;

    Ok(Json(GenerateQuizResponse::from(log)))
}

/// Grades the caller's answers for one of their quizzes.
pub async fn submit(
    State(pipeline): State<Arc<QuizPipeline>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SubmitQuizRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let student_id = claims.student_id()?;

    let score = pipeline
        .evaluate_submission(student_id, req.log_id, &req.answers_text())
        .await?;

    Ok(Json(SubmitQuizResponse {
        message: "Quiz submitted".to_string(),
        score,
    }))
}

/// Lists the caller's most recent learning logs.
pub async fn list_logs(
    State(pipeline): State<Arc<QuizPipeline>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let logs = pipeline.recent_logs(student_id).await?;
    let summaries: Vec<LearningLogSummary> = logs.iter().map(LearningLogSummary::from).collect();

    Ok(Json(summaries))
}

pub async fn get_log(
    State(pipeline): State<Arc<QuizPipeline>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.student_id()?;

    let log = pipeline.get_log(student_id, id).await?;

    Ok(Json(LearningLogDetail::from(log)))
}
