// src/services/generator.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{config::Config, error::AppError};

/// Opaque text-generation capability: one prompt in, one free-text response out.
///
/// Implementations report every provider-side failure as
/// `AppError::GenerationFailure`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Google Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

impl GeminiGenerator {
    pub fn new(client: Client, api_key: Option<String>, base_url: &Url, model: &str) -> Result<Self, AppError> {
        let endpoint = base_url
            .join(&format!("models/{}:generateContent", model))
            .map_err(|e| AppError::InternalServerError(format!("Invalid Gemini endpoint: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    /// Builds the client from configuration, with the request timeout applied
    /// at the HTTP layer as well.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.ai_timeout())
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Self::new(
            client,
            config.gemini_api_key.clone(),
            &config.gemini_base_url,
            &config.gemini_model,
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::GenerationFailure("Gemini API key not configured".to_string()))?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned {}: {}", status, detail);
            return Err(AppError::GenerationFailure(format!(
                "provider returned status {}",
                status
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;

        parsed
            .into_text()
            .ok_or_else(|| AppError::GenerationFailure("provider returned no candidates".to_string()))
    }
}
