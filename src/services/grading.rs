// src/services/grading.rs

//! Parsing of model output and submitted answers, and exact-match scoring.

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::models::quiz::{QuizPayload, QuizQuestion};

/// Matches a whole response wrapped in a Markdown code fence, capturing the body.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$")
        .expect("code fence pattern is valid")
});

/// Removes a surrounding ```json ... ``` fence if present.
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => raw.trim(),
    }
}

/// Parses a raw model response into questions.
pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, serde_json::Error> {
    serde_json::from_str(strip_code_fence(raw))
}

/// Classifies raw quiz text. Never fails: unparsable text stays `Raw`.
pub fn to_payload(raw: &str) -> QuizPayload {
    match parse_quiz(raw) {
        Ok(questions) => QuizPayload::Structured(questions),
        Err(_) => QuizPayload::Raw(raw.to_string()),
    }
}

/// Parses submitted answers: `{"1": "B", "2": "A"}`, keys are 1-based positions.
///
/// Values are kept as JSON so an unanswered `null` entry does not reject
/// the whole submission.
pub fn parse_answers(raw: &str) -> Result<HashMap<String, Value>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Trimmed, case-insensitive label comparison.
pub fn is_correct(submitted: &str, correct: &str) -> bool {
    submitted.trim().to_uppercase() == correct.trim().to_uppercase()
}

/// The answer label, if the value is a non-blank string.
fn answer_label(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

/// Counts correct answers.
///
/// Question `i` is looked up under key `i + 1`. Missing, `null`, blank and
/// non-string answers are skipped: they add nothing and do not affect the
/// other questions.
pub fn score_answers(questions: &[QuizQuestion], answers: &HashMap<String, Value>) -> i64 {
    questions
        .iter()
        .enumerate()
        .filter(|(i, question)| {
            answers
                .get(&(i + 1).to_string())
                .and_then(answer_label)
                .is_some_and(|given| is_correct(given, &question.answer))
        })
        .count() as i64
}

/// Parses both stored quiz and submitted answers, then scores.
/// Fails if either payload does not parse.
pub fn score_submission(raw_quiz: &str, raw_answers: &str) -> Result<i64, serde_json::Error> {
    let questions = parse_quiz(raw_quiz)?;
    let answers = parse_answers(raw_answers)?;
    Ok(score_answers(&questions, &answers))
}
