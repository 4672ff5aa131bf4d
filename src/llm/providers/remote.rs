use crate::config::LlmConfig;
use crate::llm::models::{PromptConfig, RawResponse};
use crate::llm::{LlmError, ProgressReporter, ProgressSink, SchemaGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

// Progress while the request is outstanding climbs from START by STEP per tick and never passes
// CAP; only a settled, successful request reports 100.
const PROGRESS_START: u8 = 30;
const PROGRESS_STEP: u8 = 5;
const PROGRESS_CAP: u8 = 90;

/// Chat-completion client for OpenAI-compatible endpoints.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    progress_interval: Duration,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            model: config.model.clone(),
            // interval() panics on a zero period
            progress_interval: Duration::from_millis(config.progress_interval_ms.max(1)),
        })
    }

    async fn send(&self, api_key: &str, prompt: &PromptConfig) -> Result<RawResponse, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system_instruction,
                },
                Message {
                    role: "user",
                    content: &prompt.user_instruction,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        debug!("Sending chat completion request to {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .map(|envelope| envelope.error.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

            error!("LLM API responded with status code: {} - {}", status, message);
            return Err(LlmError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: PromptResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                LlmError::Upstream {
                    status: status.as_u16(),
                    message: format!("Malformed response body: {}", e),
                }
            } else {
                LlmError::Network(e.to_string())
            }
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(RawResponse {
            text,
            model: self.model.clone(),
            tokens_used: body.usage.map(|usage| usage.total_tokens),
        })
    }
}

#[async_trait]
impl SchemaGenerator for RemoteLlmProvider {
    async fn generate(
        &self,
        prompt: &PromptConfig,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RawResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LlmError::Configuration(
                "API key not found. Set llm.api_key or the OPENAI_API_KEY environment variable."
                    .to_string(),
            )
        })?;

        let reporter = ProgressReporter::new(progress);
        reporter.emit("ai_call", PROGRESS_START, "Analyzing your requirements...");
        info!("Calling {} with {} max tokens", self.model, prompt.max_tokens);

        let request = self.send(api_key, prompt);
        tokio::pin!(request);

        // The ticker lives only inside this loop, so no notification can follow the response.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.progress_interval,
            self.progress_interval,
        );
        let mut percent = PROGRESS_START;

        let outcome = loop {
            tokio::select! {
                biased;
                result = &mut request => break result,
                _ = ticker.tick() => {
                    percent = percent.saturating_add(PROGRESS_STEP).min(PROGRESS_CAP);
                    reporter.emit("ai_processing", percent, "AI is generating your schema...");
                }
            }
        };

        let raw = outcome?;
        reporter.emit("complete", 100, "Schema generation complete!");
        Ok(raw)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
