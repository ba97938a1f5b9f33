//! Shared models and text utilities
pub mod code_text;
pub mod models;

pub use models::*;
