pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod providers;

use crate::config::LlmConfig;
use crate::llm::models::{GenerationInput, GenerationOutcome, Progress, PromptConfig, RawResponse};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM API error: {status} {message}")]
    Upstream { status: u16, message: String },

    #[error("LLM connection error: {0}")]
    Network(String),
}

/// Receives progress updates while a generation is running.
pub trait ProgressSink: Send + Sync {
    fn notify(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn notify(&self, progress: Progress) {
        self(progress)
    }
}

/// Wraps an optional sink; emitting with no sink attached does nothing.
#[derive(Clone, Copy)]
pub struct ProgressReporter<'a> {
    sink: Option<&'a dyn ProgressSink>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, step: &str, percent: u8, message: &str) {
        if let Some(sink) = self.sink {
            sink.notify(Progress::new(step, percent, message));
        }
    }
}

/// Turns a prompt into raw model text. Live and mock backends both implement this.
#[async_trait]
pub trait SchemaGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &PromptConfig,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RawResponse, LlmError>;

    fn model(&self) -> &str;
}

pub struct LlmManager {
    generator: Box<dyn SchemaGenerator + Send + Sync>,
    mock: providers::mock::MockProvider,
    backend: String,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mock = providers::mock::MockProvider::from_config(config);

        let generator: Box<dyn SchemaGenerator + Send + Sync> = match config.backend.as_str() {
            "openai" | "remote" => {
                if config.api_key.is_none() {
                    warn!("No API key configured; live generation will fail until one is set");
                }
                Box::new(providers::remote::RemoteLlmProvider::new(config)?)
            }
            "mock" => Box::new(mock.clone()),
            _ => {
                return Err(LlmError::Configuration(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )));
            }
        };

        info!("LLM backend '{}' using model '{}'", config.backend, generator.model());

        Ok(Self {
            generator,
            mock,
            backend: config.backend.clone(),
        })
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn generator(&self, use_mock: bool) -> &dyn SchemaGenerator {
        if use_mock {
            &self.mock
        } else {
            self.generator.as_ref()
        }
    }

    pub async fn generate_schema(
        &self,
        input: &GenerationInput,
        use_mock: bool,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<GenerationOutcome, LlmError> {
        pipeline::generate_schema(input, self.generator(use_mock), progress).await
    }
}
