//! LLM-backed request classification for the Argus backend.
//!
//! The [`Analyzer`] turns an [`argus_core::AnalysisRequest`] into a
//! validated [`argus_core::AnalysisResponse`]: it truncates the captured
//! body to the model's token budget, embeds the whole request as JSON into
//! the classifier prompt, and coerces the model output into the strict
//! three-field verdict schema.

pub mod analyzer;
pub mod client;
pub mod gemini;
pub mod prompt;
pub mod truncate;

pub use analyzer::Analyzer;
pub use client::AiClient;
pub use gemini::GeminiClient;
pub use truncate::truncate_log;
