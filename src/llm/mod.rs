//! LLM integration for classification, correction and analysis.
//!
//! `client` talks to a provider, `gateway` adds retries and timeouts, and
//! `mock` provides a scripted backend for tests (`test-util` feature).

pub mod client;
pub mod gateway;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{
    prompts, ImageInput, InferenceBackend, InferenceRequest, InferenceResponse, LlmClient,
    LlmConfig, LlmError, LlmProvider, TokenUsage,
};
pub use gateway::{InferenceGateway, InferenceOutcome, RetryPolicy};
