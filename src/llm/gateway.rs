//! Retrying wrapper around an inference backend.
//!
//! Every failure (backend error or timeout) is retried up to the policy's
//! attempt limit with a fixed delay. When attempts run out the caller gets
//! `text: None` and zero usage; errors never escape the gateway.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::client::{
    ImageInput, InferenceBackend, InferenceRequest, LlmClient, LlmConfig, LlmError, TokenUsage,
};

/// Bounded retry with a fixed inter-attempt delay and a per-call timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Same attempts, no waiting. For tests and fakes.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// Result of a gateway call. `text` is `None` when every attempt failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOutcome {
    pub text: Option<String>,
    pub usage: TokenUsage,
}

impl InferenceOutcome {
    pub fn failed() -> Self {
        Self::default()
    }

    /// Trimmed text, treating empty answers as no answer.
    pub fn answer(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Shared entry point for all inference calls in a run.
#[derive(Clone)]
pub struct InferenceGateway {
    backend: Arc<dyn InferenceBackend>,
    policy: RetryPolicy,
    temperature: f32,
    vision_max_tokens: u32,
}

impl InferenceGateway {
    pub fn new(backend: Arc<dyn InferenceBackend>, policy: RetryPolicy) -> Self {
        let defaults = LlmConfig::default();
        Self {
            backend,
            policy,
            temperature: defaults.temperature,
            vision_max_tokens: defaults.vision_max_tokens,
        }
    }

    /// Build a gateway over the configured HTTP provider.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = LlmClient::new(config.clone())?;
        Ok(Self {
            backend: Arc::new(client),
            policy: RetryPolicy::from_config(config),
            temperature: config.temperature,
            vision_max_tokens: config.vision_max_tokens,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_vision_max_tokens(mut self, max_tokens: u32) -> Self {
        self.vision_max_tokens = max_tokens;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Text-only call.
    pub async fn call(&self, system: &str, user: &str) -> InferenceOutcome {
        self.execute(InferenceRequest {
            system: system.to_string(),
            user: user.to_string(),
            image: None,
            temperature: self.temperature,
            max_tokens: None,
        })
        .await
    }

    /// Multimodal call with an inline image and the vision output cap.
    pub async fn describe_image(&self, prompt: &str, image: ImageInput) -> InferenceOutcome {
        self.execute(InferenceRequest {
            system: String::new(),
            user: prompt.to_string(),
            image: Some(image),
            temperature: self.temperature,
            max_tokens: Some(self.vision_max_tokens),
        })
        .await
    }

    async fn execute(&self, request: InferenceRequest) -> InferenceOutcome {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let result =
                tokio::time::timeout(self.policy.timeout, self.backend.complete(&request)).await;

            match result {
                Ok(Ok(response)) => {
                    debug!(
                        "Inference succeeded on attempt {} ({} in / {} out)",
                        attempt, response.usage.tokens_in, response.usage.tokens_out
                    );
                    return InferenceOutcome {
                        text: Some(response.text.trim().to_string()),
                        usage: response.usage,
                    };
                }
                Ok(Err(e)) => {
                    warn!(
                        "{} call failed (attempt {}/{}): {}",
                        self.backend.name(),
                        attempt,
                        attempts,
                        e
                    );
                }
                Err(_) => {
                    warn!(
                        "{} call failed (attempt {}/{}): {}",
                        self.backend.name(),
                        attempt,
                        attempts,
                        LlmError::Timeout(self.policy.timeout)
                    );
                }
            }

            if attempt < attempts && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        InferenceOutcome::failed()
    }
}
