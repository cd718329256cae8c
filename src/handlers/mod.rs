// src/handlers/mod.rs

pub mod tutor;
