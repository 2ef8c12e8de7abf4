//! Chat-completion client shared by every judgment call
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol. Transient
//! failures (transport errors, 429, 5xx) are retried with exponential
//! backoff; other client errors fail immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};

/// A single system + user exchange
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Ask the model for a JSON object instead of free text
    pub json: bool,
}

impl Prompt {
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: false,
        }
    }

    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: true,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Failure of one HTTP attempt, tagged with whether it is worth retrying
struct AttemptError {
    error: AppError,
    retryable: bool,
}

/// Client for an OpenAI-compatible chat completions endpoint
pub struct LlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClient {
    /// Create a new client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    /// Whether an API key is present
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Run one completion, retrying transient failures
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        if !self.is_configured() {
            return Err(AppError::Configuration {
                message: "LLM API key not configured".to_string(),
            });
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
            response_format: prompt.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let max_attempts = self.config.max_retries.max(1);
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(
                self.config.timeout_secs * u64::from(max_attempts),
            )),
            ..ExponentialBackoff::default()
        };

        let started = Instant::now();
        let request = &request;
        let attempts = &attempts;
        let result = backoff::future::retry(policy, || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            match self.send(request).await {
                Ok(content) => Ok(content),
                Err(e) if e.retryable && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e.error,
                        "LLM request failed, retrying"
                    );
                    Err(backoff::Error::transient(e.error))
                }
                Err(e) => Err(backoff::Error::permanent(e.error)),
            }
        })
        .await;

        debug!(
            model = %self.config.model,
            attempts = attempts.load(Ordering::Relaxed),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "LLM completion finished"
        );

        result
    }

    async fn send(&self, request: &ChatRequest<'_>) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError {
                error: AppError::LlmError {
                    message: format!("LLM API request failed: {}", e),
                },
                retryable: true,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                error: AppError::LlmError {
                    message: format!("LLM API error {}: {}", status, body),
                },
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| AttemptError {
            error: AppError::LlmError {
                message: format!("Failed to parse LLM response: {}", e),
            },
            retryable: false,
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AttemptError {
                error: AppError::LlmError {
                    message: "Empty response from LLM".to_string(),
                },
                retryable: false,
            })
    }
}
