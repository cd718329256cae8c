// src/services/quiz_pipeline.rs

//! Quiz generation, persistence and grading.

use std::{sync::Arc, time::Duration};

use crate::{
    config::{DEFAULT_LEVEL, HISTORY_LIMIT, MAX_LEVEL_LEN, MAX_TOPIC_LEN, QUIZ_QUESTION_COUNT},
    error::AppError,
    models::learning_log::{LearningLog, NewLearningLog, QuizSubmission},
    services::{generator::TextGenerator, grading},
    store::{QuizStore, SubmitOutcome},
};

pub struct QuizPipeline {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn QuizStore>,
    timeout: Duration,
}

/// Prompt asking the model for a JSON quiz on `topic`.
pub fn quiz_prompt(topic: &str, level: &str) -> String {
    format!(
        "Generate exactly {count} multiple-choice questions about \"{topic}\" for a {level} level student. \
         Return the result as a valid JSON array only, with no extra text and no Markdown. \
         Each element must be an object with the keys \"question\" (string), \
         \"options\" (array of strings labeled \"A. ...\", \"B. ...\", \"C. ...\", \"D. ...\") \
         and \"answer\" (the single letter of the correct option).",
        count = QUIZ_QUESTION_COUNT,
    )
}

pub fn explanation_prompt(topic: &str, level: &str) -> String {
    format!("Explain \"{topic}\" to a {level} level student using simple examples.")
}

/// Validated topic and level of a generation request.
/// Runs before any provider call, so oversized input never costs a generation.
fn normalize_request(topic: &str, level: Option<&str>) -> Result<(String, String), AppError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AppError::BadRequest("Topic is required.".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_LEN {
        return Err(AppError::BadRequest(format!(
            "Topic must be at most {} characters.",
            MAX_TOPIC_LEN
        )));
    }

    let level = level
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LEVEL);
    if level.chars().count() > MAX_LEVEL_LEN {
        return Err(AppError::BadRequest(format!(
            "Level must be at most {} characters.",
            MAX_LEVEL_LEN
        )));
    }

    Ok((topic.to_string(), level.to_string()))
}

impl QuizPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn QuizStore>, timeout: Duration) -> Self {
        Self {
            generator,
            store,
            timeout,
        }
    }

    /// Single provider call bounded by the configured timeout. No retries.
    async fn call_generator(&self, prompt: &str) -> Result<String, AppError> {
        let text = tokio::time::timeout(self.timeout, self.generator.generate(prompt))
            .await
            .map_err(|_| {
                AppError::GenerationFailure(format!(
                    "provider did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if text.trim().is_empty() {
            return Err(AppError::GenerationFailure(
                "provider returned an empty response".to_string(),
            ));
        }

        Ok(text)
    }

    /// Generates the explanation text that accompanies a quiz.
    pub async fn explain(&self, topic: &str, level: Option<&str>) -> Result<String, AppError> {
        let (topic, level) = normalize_request(topic, level)?;
        self.call_generator(&explanation_prompt(&topic, &level)).await
    }

    /// Requests a quiz, stores it and returns the new log.
    ///
    /// Output that is not a JSON question array is still stored; it reads
    /// back as `QuizPayload::Raw` and can never earn points.
    pub async fn generate_quiz(
        &self,
        student_id: i64,
        topic: &str,
        level: Option<&str>,
        explanation: String,
    ) -> Result<LearningLog, AppError> {
        let (topic, level) = normalize_request(topic, level)?;

        let raw = self.call_generator(&quiz_prompt(&topic, &level)).await?;

        if let Err(e) = grading::parse_quiz(&raw) {
            tracing::warn!(
                "Quiz for topic '{}' is not valid JSON, storing raw text: {}",
                topic,
                e
            );
        }

        let log = self
            .store
            .insert(NewLearningLog {
                student_id,
                topic,
                level,
                explanation,
                quiz: raw,
            })
            .await?;

        tracing::info!("Created learning log {} for student {}", log.id, student_id);

        Ok(log)
    }

    /// Explanation followed by quiz. Validation runs before any provider call,
    /// and nothing is stored if either call fails.
    pub async fn generate_lesson(
        &self,
        student_id: i64,
        topic: &str,
        level: Option<&str>,
    ) -> Result<LearningLog, AppError> {
        normalize_request(topic, level)?;

        let explanation = self.explain(topic, level).await?;
        self.generate_quiz(student_id, topic, level, explanation).await
    }

    /// Grades a submission and stores it.
    ///
    /// Ownership is checked first: a log that does not exist and a log owned
    /// by another student both yield `NotFound`.
    pub async fn evaluate_submission(
        &self,
        student_id: i64,
        log_id: i64,
        answers: &str,
    ) -> Result<i64, AppError> {
        let grade = |log: &LearningLog| QuizSubmission {
            user_answers: answers.to_string(),
            score: score_or_zero(log.id, &log.quiz, answers),
        };

        match self.store.submit(log_id, student_id, &grade).await? {
            SubmitOutcome::Graded(log) => {
                tracing::info!(
                    "Student {} submitted quiz {} with score {}",
                    student_id,
                    log.id,
                    log.quiz_score
                );
                Ok(log.quiz_score)
            }
            SubmitOutcome::NotFound => Err(AppError::NotFound("Learning log not found".to_string())),
            SubmitOutcome::AlreadySubmitted => {
                Err(AppError::Conflict("Quiz already submitted".to_string()))
            }
        }
    }

    pub async fn get_log(&self, student_id: i64, log_id: i64) -> Result<LearningLog, AppError> {
        self.store
            .find_owned(log_id, student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Learning log not found".to_string()))
    }

    pub async fn recent_logs(&self, student_id: i64) -> Result<Vec<LearningLog>, AppError> {
        self.store.list_recent(student_id, HISTORY_LIMIT).await
    }
}

/// Unparsable quiz or answers grade as zero instead of failing the request.
fn score_or_zero(log_id: i64, raw_quiz: &str, raw_answers: &str) -> i64 {
    match grading::score_submission(raw_quiz, raw_answers) {
        Ok(score) => score,
        Err(e) => {
            tracing::warn!("Grading log {} as 0, payload did not parse: {}", log_id, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::MemoryQuizStore;

    const QUIZ: &str = r#"[{"question":"Q1","options":["A. x","B. y"],"answer":"B"},{"question":"Q2","options":["A. x","B. y"],"answer":"A"}]"#;

    /// Returns a fixed reply and counts calls.
    struct FixedGenerator {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl FixedGenerator {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(AppError::GenerationFailure)
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, AppError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(QUIZ.to_string())
        }
    }

    fn pipeline(generator: Arc<dyn TextGenerator>) -> QuizPipeline {
        QuizPipeline::new(generator, Arc::new(MemoryQuizStore::new()), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_generate_stores_raw_payload() {
        let generator = FixedGenerator::ok(QUIZ);
        let pipeline = pipeline(generator.clone());

        let log = pipeline
            .generate_quiz(1, "Fractions", None, "expl".into())
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(log.quiz, QUIZ);
        assert_eq!(log.level, "beginner");
        assert_eq!(log.payload().questions().map(|q| q.len()), Some(2));
        assert_eq!(log.graded_score(), None);
    }

    #[tokio::test]
    async fn test_generate_degrades_on_unparsable_quiz() {
        let pipeline = pipeline(FixedGenerator::ok("not json"));

        let log = pipeline
            .generate_quiz(1, "Fractions", Some("advanced"), String::new())
            .await
            .unwrap();

        assert!(log.payload().questions().is_none());
        assert_eq!(log.quiz, "not json");
        assert_eq!(log.level, "advanced");
    }

    #[tokio::test]
    async fn test_empty_topic_rejected_without_provider_call() {
        let generator = FixedGenerator::ok(QUIZ);
        let pipeline = pipeline(generator.clone());

        let err = pipeline.generate_lesson(1, "   ", None).await.unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_input_rejected_before_provider_call() {
        let generator = FixedGenerator::ok(QUIZ);
        let pipeline = pipeline(generator.clone());

        let long_level = "x".repeat(MAX_LEVEL_LEN + 1);
        let err = pipeline
            .generate_quiz(1, "Cells", Some(&long_level), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let long_topic = "t".repeat(MAX_TOPIC_LEN + 1);
        let err = pipeline.generate_lesson(1, &long_topic, None).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

        let max_level = "é".repeat(MAX_LEVEL_LEN);
        let log = pipeline
            .generate_quiz(1, "Cells", Some(&max_level), String::new())
            .await
            .unwrap();
        assert_eq!(log.level, max_level);
    }

    #[tokio::test]
    async fn test_provider_error_is_generation_failure() {
        let generator = FixedGenerator::failing("quota exceeded");
        let pipeline = pipeline(generator.clone());

        let err = pipeline.generate_lesson(1, "Cells", None).await.unwrap_err();

        assert!(matches!(err, AppError::GenerationFailure(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(pipeline.recent_logs(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_provider_response_is_failure() {
        let pipeline = pipeline(FixedGenerator::ok("  \n"));
        let err = pipeline
            .generate_quiz(1, "Cells", None, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let pipeline = pipeline(Arc::new(SlowGenerator));
        let err = pipeline
            .generate_quiz(1, "Cells", None, String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_evaluate_scores_and_persists() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let score = pipeline
            .evaluate_submission(1, log.id, r#"{"1":"b","2":"A"}"#)
            .await
            .unwrap();
        assert_eq!(score, 2);

        let stored = pipeline.get_log(1, log.id).await.unwrap();
        assert_eq!(stored.graded_score(), Some(2));
        assert_eq!(stored.user_answers.as_deref(), Some(r#"{"1":"b","2":"A"}"#));
    }

    #[tokio::test]
    async fn test_missing_answer_counts_nothing() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let score = pipeline
            .evaluate_submission(1, log.id, r#"{"1":"B"}"#)
            .await
            .unwrap();
        assert_eq!(score, 1);
    }

    #[tokio::test]
    async fn test_malformed_answers_score_zero() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let score = pipeline.evaluate_submission(1, log.id, "{invalid").await.unwrap();
        assert_eq!(score, 0);
        assert_eq!(pipeline.get_log(1, log.id).await.unwrap().graded_score(), Some(0));
    }

    #[tokio::test]
    async fn test_null_answer_skips_only_that_question() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let score = pipeline
            .evaluate_submission(1, log.id, r#"{"1":"B","2":null}"#)
            .await
            .unwrap();
        assert_eq!(score, 1);
        assert_eq!(pipeline.get_log(1, log.id).await.unwrap().graded_score(), Some(1));
    }

    #[tokio::test]
    async fn test_raw_quiz_scores_zero() {
        let pipeline = pipeline(FixedGenerator::ok("Sure! Here is your quiz: ..."));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let score = pipeline
            .evaluate_submission(1, log.id, r#"{"1":"A"}"#)
            .await
            .unwrap();
        assert_eq!(score, 0);
    }

    #[tokio::test]
    async fn test_foreign_log_not_found_and_untouched() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let err = pipeline
            .evaluate_submission(2, log.id, r#"{"1":"B","2":"A"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let missing = pipeline
            .evaluate_submission(1, log.id + 100, r#"{"1":"B"}"#)
            .await
            .unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));

        let stored = pipeline.get_log(1, log.id).await.unwrap();
        assert_eq!(stored.graded_score(), None);
    }

    #[tokio::test]
    async fn test_second_submission_conflicts() {
        let pipeline = pipeline(FixedGenerator::ok(QUIZ));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        pipeline
            .evaluate_submission(1, log.id, r#"{"1":"B","2":"A"}"#)
            .await
            .unwrap();
        let err = pipeline
            .evaluate_submission(1, log.id, r#"{"1":"A"}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(pipeline.get_log(1, log.id).await.unwrap().quiz_score, 2);
    }

    #[tokio::test]
    async fn test_fresh_log_reads_are_stable() {
        let pipeline = pipeline(FixedGenerator::ok("not json"));
        let log = pipeline.generate_lesson(1, "Fractions", None).await.unwrap();

        let first = pipeline.get_log(1, log.id).await.unwrap();
        let second = pipeline.get_log(1, log.id).await.unwrap();

        assert_eq!(first.quiz, second.quiz);
        assert_eq!(first.quiz_score, 0);
        assert_eq!(second.quiz_score, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_quiz_prompt_mentions_contract() {
        let prompt = quiz_prompt("Photosynthesis", "beginner");
        assert!(prompt.contains("exactly 3"));
        assert!(prompt.contains("Photosynthesis"));
        assert!(prompt.contains("\"answer\""));
        assert!(prompt.contains("JSON array"));
    }
}
