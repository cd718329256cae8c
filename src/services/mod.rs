// src/services/mod.rs

pub mod generator;
pub mod grading;
pub mod quiz_pipeline;
