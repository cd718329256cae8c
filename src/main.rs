// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tutor::config::{Config, StorageBackend};
use tutor::routes;
use tutor::services::{generator::GeminiGenerator, quiz_pipeline::QuizPipeline};
use tutor::state::AppState;
use tutor::store::{MemoryQuizStore, PgQuizStore, QuizStore};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let backend = config
        .storage_backend()
        .unwrap_or_else(|msg| panic!("{}", msg));

    let store: Arc<dyn QuizStore> = match backend {
        StorageBackend::Postgres(database_url) => {
            let pool = connect_with_retry(&database_url).await;

            // Run Migrations Automatically
            tracing::info!("Running migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Migrations applied successfully.");

            Arc::new(PgQuizStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, learning logs are lost on restart");
            Arc::new(MemoryQuizStore::new())
        }
    };

    if config.gemini_api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, quiz generation will fail");
    }

    let generator = GeminiGenerator::from_config(&config).expect("Failed to build Gemini client");
    let pipeline = QuizPipeline::new(Arc::new(generator), store, config.ai_timeout());

    // Create AppState
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app).await.expect("Server error");
}

/// Initialize Database Pool with Retry
async fn connect_with_retry(database_url: &str) -> PgPool {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!("Database connected...");
                return pool;
            }
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
