//! # scout-inference
//!
//! LLM inference for vibescout.
//!
//! This crate provides:
//! - Ollama generation backend over the `/api/chat` endpoint
//! - Vibe summarization of harvested review snippets
//! - Chat intent classification with keyword fallback

pub mod intent;
pub mod ollama;
pub mod summarize;

// Mock generation backend for testing
// Note: Always compiled so dependent crates' tests can drive the pipeline
// without an Ollama server
pub mod mock;

// Re-export core types
pub use scout_core::*;

pub use intent::{
    keyword_classification, simple_reply, ExtractedData, Intent, IntentClassification,
    IntentClassifier,
};
pub use mock::MockGenerationBackend;
pub use ollama::OllamaBackend;
pub use summarize::VibeSummarizer;
