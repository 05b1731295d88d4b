//! Mock generation backend for deterministic testing.
//!
//! Scripted responses keyed by prompt fragments, with a call log and failure
//! injection. Lets summarizer, classifier, and pipeline tests run without an
//! Ollama server.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scout_inference::mock::MockGenerationBackend;
//!
//! #[tokio::test]
//! async fn test_with_mock_backend() {
//!     let backend = MockGenerationBackend::new()
//!         .with_response_for("Blue Tokai", r#"{"summary": "Calm cafe."}"#);
//!
//!     let raw = backend.generate_json("reviews for Blue Tokai").await.unwrap();
//!     assert!(raw.contains("Calm cafe"));
//! }
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use scout_core::{Error, GenerationBackend, Result};

/// One logged generation call.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub operation: String,
    pub prompt: String,
}

/// Scripted [`GenerationBackend`] for tests.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<GenerationCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    /// Fragment-keyed responses, first containing fragment wins.
    scripted: Vec<(String, String)>,
    default_response: String,
    fail: bool,
    latency_ms: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            scripted: Vec::new(),
            default_response: "{}".to_string(),
            fail: false,
            latency_ms: 0,
        }
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Respond with `response` to any prompt containing `fragment`.
    ///
    /// Earlier mappings win when several fragments match.
    pub fn with_response_for(
        mut self,
        fragment: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .scripted
            .push((fragment.into(), response.into()));
        self
    }

    /// Set the response for prompts no fragment matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Make every generation fail (for degradation tests).
    pub fn with_failure(mut self, fail: bool) -> Self {
        Arc::make_mut(&mut self.config).fail = fail;
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<GenerationCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of generation calls issued (plain and JSON).
    pub fn generate_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    async fn respond(&self, operation: &str, prompt: &str) -> Result<String> {
        self.call_log.lock().unwrap().push(GenerationCall {
            operation: operation.to_string(),
            prompt: prompt.to_string(),
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail {
            return Err(Error::Inference("simulated inference failure".to_string()));
        }

        for (fragment, response) in &self.config.scripted {
            if prompt.contains(fragment) {
                return Ok(response.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.respond("generate", prompt).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.respond("generate_json", prompt).await
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
