use std::sync::Arc;

use crate::config::Config;
use crate::services::quiz_pipeline::QuizPipeline;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QuizPipeline>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<QuizPipeline> {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
