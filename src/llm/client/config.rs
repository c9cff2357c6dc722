//! Inference client configuration.
//!
//! Env vars: REVISOR_PROVIDER, REVISOR_MODEL, REVISOR_ENDPOINT, REVISOR_API_KEY
//! (OPENAI_API_KEY, GROQ_API_KEY and OLLAMA_HOST accepted as fallback)

use serde::{Deserialize, Serialize};

use super::prompts::{GLOBAL_ANALYSIS_PROMPT, TEXTUAL_CORRECTION_PROMPT};

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for the inference client and the retrying gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (ollama or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider-specific defaults apply)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for every call, including image descriptions
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per call before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Output cap for image descriptions
    #[serde(default = "default_vision_max_tokens")]
    pub vision_max_tokens: u32,
    /// Custom system prompt for textual correction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textual_prompt: Option<String>,
    /// Custom global analysis prompt (uses {dossier} placeholder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_prompt: Option<String>,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2-vision:11b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_vision_max_tokens() -> u32 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            vision_max_tokens: default_vision_max_tokens(),
            textual_prompt: None,
            global_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Priority: REVISOR_PROVIDER wins over auto-detection from API keys.
    /// Explicit endpoint, key and model always win over provider defaults.
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        let explicit_provider = var("REVISOR_PROVIDER");
        if let Some(provider) = explicit_provider.as_deref().and_then(LlmProvider::from_str) {
            self.provider = provider;
        }

        let explicit_endpoint = var("REVISOR_ENDPOINT");
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = endpoint.clone();
        } else if let Some(ollama_host) = var("OLLAMA_HOST") {
            if self.provider == LlmProvider::Ollama {
                self.endpoint = ollama_host;
            }
        }

        if let Some(key) = var("REVISOR_API_KEY") {
            self.api_key = Some(key);
        }

        let explicit_model = var("REVISOR_MODEL");

        if let Some(ref provider_str) = explicit_provider {
            let provider_lower = provider_str.to_lowercase();

            if explicit_endpoint.is_none() {
                match provider_lower.as_str() {
                    "groq" => self.endpoint = "https://api.groq.com/openai".to_string(),
                    "openai" => self.endpoint = "https://api.openai.com".to_string(),
                    "together" => self.endpoint = "https://api.together.xyz".to_string(),
                    _ => {}
                }
            }

            if self.api_key.is_none() {
                match provider_lower.as_str() {
                    "groq" => self.api_key = var("GROQ_API_KEY"),
                    "openai" => self.api_key = var("OPENAI_API_KEY"),
                    _ => {}
                }
            }

            if explicit_model.is_none() && self.model == default_model() {
                match provider_lower.as_str() {
                    "groq" => {
                        self.model = "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
                    }
                    "openai" => self.model = "gpt-4o".to_string(),
                    _ => {}
                }
            }
        } else if self.api_key.is_none() && self.provider == LlmProvider::Ollama {
            // No explicit provider - auto-detect from available keys
            if let Some(key) = var("OPENAI_API_KEY") {
                self.api_key = Some(key);
                self.provider = LlmProvider::OpenAI;
                if explicit_endpoint.is_none() {
                    self.endpoint = "https://api.openai.com".to_string();
                }
                if self.model == default_model() {
                    self.model = "gpt-4o".to_string();
                }
            }
        }

        if let Some(model) = explicit_model {
            self.model = model;
        }

        self
    }

    /// Get the provider name for display.
    pub fn provider_name(&self) -> &'static str {
        match self.provider {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAI => {
                if self.endpoint.contains("groq.com") {
                    "Groq"
                } else if self.endpoint.contains("together.xyz") {
                    "Together.ai"
                } else {
                    "OpenAI"
                }
            }
        }
    }

    /// Get the textual correction prompt, using custom or default.
    pub fn get_textual_prompt(&self) -> &str {
        self.textual_prompt
            .as_deref()
            .unwrap_or(TEXTUAL_CORRECTION_PROMPT)
    }

    /// Get the global analysis prompt, using custom or default.
    pub fn get_global_prompt(&self) -> &str {
        self.global_prompt.as_deref().unwrap_or(GLOBAL_ANALYSIS_PROMPT)
    }
}
