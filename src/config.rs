// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

/// Number of questions requested from the model per quiz.
pub const QUIZ_QUESTION_COUNT: usize = 3;

/// Difficulty used when the request omits `level`.
pub const DEFAULT_LEVEL: &str = "beginner";

/// Column bounds of `learning_logs.topic` / `learning_logs.level`, in characters.
pub const MAX_TOPIC_LEN: usize = 255;
pub const MAX_LEVEL_LEN: usize = 64;

/// Max learning logs returned by the history endpoint.
pub const HISTORY_LIMIT: i64 = 20;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Where learning logs are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres(String),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,

    /// Keep learning logs in process memory when no database URL is set.
    /// Off by default: a missing `DATABASE_URL` is a startup error.
    pub allow_in_memory_store: bool,

    pub jwt_secret: String,
    pub rust_log: String,
    pub port: u16,

    /// Missing key is not fatal at startup; generation requests fail with 502 instead.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: Url,

    /// Upper bound for a single text-generation round trip.
    pub ai_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty());

        let allow_in_memory_store = env::var("ALLOW_IN_MEMORY_STORE")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let gemini_model =
            env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string());

        let gemini_base_url = parse_base_url(
            &env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
        )
        .expect("GEMINI_BASE_URL must be a valid absolute URL");

        let ai_timeout_secs = env::var("AI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(30);

        Self {
            database_url,
            allow_in_memory_store,
            jwt_secret,
            rust_log,
            port,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            ai_timeout_secs,
        }
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    /// Postgres when a database URL is configured; memory only on explicit opt-in.
    pub fn storage_backend(&self) -> Result<StorageBackend, String> {
        match (&self.database_url, self.allow_in_memory_store) {
            (Some(url), _) => Ok(StorageBackend::Postgres(url.clone())),
            (None, true) => Ok(StorageBackend::Memory),
            (None, false) => Err(
                "DATABASE_URL must be set (or ALLOW_IN_MEMORY_STORE=true for a non-persistent store)"
                    .to_string(),
            ),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Parses the provider base URL, forcing a trailing slash so `Url::join`
/// appends path segments instead of replacing the last one.
pub fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{}/", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = parse_base_url("http://localhost:9000/v1beta").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/v1beta/");
        assert_eq!(
            url.join("models/x:generateContent").unwrap().as_str(),
            "http://localhost:9000/v1beta/models/x:generateContent"
        );
    }

    #[test]
    fn relative_base_url_is_rejected() {
        assert!(parse_base_url("not a url").is_err());
    }

    fn config(database_url: Option<&str>, allow_in_memory_store: bool) -> Config {
        Config {
            database_url: database_url.map(str::to_string),
            allow_in_memory_store,
            jwt_secret: "secret".to_string(),
            rust_log: "info".to_string(),
            port: 3000,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: parse_base_url(DEFAULT_GEMINI_BASE_URL).unwrap(),
            ai_timeout_secs: 30,
        }
    }

    #[test]
    fn missing_database_url_requires_opt_in() {
        assert!(config(None, false).storage_backend().is_err());
        assert_eq!(
            config(None, true).storage_backend().unwrap(),
            StorageBackend::Memory
        );
    }

    #[test]
    fn database_url_wins_over_memory_flag() {
        let url = "postgres://localhost/tutor";
        assert_eq!(
            config(Some(url), true).storage_backend().unwrap(),
            StorageBackend::Postgres(url.to_string())
        );
    }

    #[test]
    fn flag_values() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
