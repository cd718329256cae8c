// src/models/mod.rs

pub mod learning_log;
pub mod quiz;
