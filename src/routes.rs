// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers::tutor, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * All tutor routes sit behind the bearer-token middleware.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pipeline, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let tutor_routes = Router::new()
        .route("/", post(tutor::generate))
        .route("/submit", post(tutor::submit))
        .route("/logs", get(tutor::list_logs))
        .route("/logs/{id}", get(tutor::get_log))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/tutor", tutor_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
