// src/models/quiz.rs

use serde::{Deserialize, Serialize};

/// One multiple-choice question as produced by the generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default)]
    pub question: String,

    /// Labeled choices, usually ["A. 4", "B. 5"]. Kept as JSON because models
    /// sometimes return an object keyed by label; grading only reads `answer`.
    #[serde(default)]
    pub options: serde_json::Value,

    /// Label of the correct option ("A", "B", ...).
    pub answer: String,
}

/// Quiz content of a learning log.
///
/// The model is not guaranteed to return valid JSON, so a log may carry
/// either parsed questions or the text exactly as it was received.
/// Serializes untagged: an array for `Structured`, a string for `Raw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuizPayload {
    Structured(Vec<QuizQuestion>),
    Raw(String),
}

impl QuizPayload {
    pub fn is_structured(&self) -> bool {
        matches!(self, QuizPayload::Structured(_))
    }

    /// Parsed questions, absent for raw payloads.
    pub fn questions(&self) -> Option<&[QuizQuestion]> {
        match self {
            QuizPayload::Structured(questions) => Some(questions),
            QuizPayload::Raw(_) => None,
        }
    }
}
