//! Scripted inference backend for tests.
//!
//! Answers come from a responder closure; every request is recorded so
//! tests can assert on call counts and prompts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{InferenceBackend, InferenceRequest, InferenceResponse, LlmError, TokenUsage};

type Responder = dyn Fn(&InferenceRequest, usize) -> Result<String, LlmError> + Send + Sync;

pub struct ScriptedBackend {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Mutex<Vec<InferenceRequest>>,
    count: AtomicUsize,
}

impl ScriptedBackend {
    /// Usage reported for every successful scripted answer.
    pub const USAGE: TokenUsage = TokenUsage {
        tokens_in: 10,
        tokens_out: 5,
    };

    /// Answer with `respond(request, call_index)`.
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&InferenceRequest, usize) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(respond),
            delay: None,
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    /// Always answer with the same text.
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Echo the user message back unchanged.
    pub fn echo() -> Self {
        Self::new(|request, _| Ok(request.user.clone()))
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self::new(|_, _| Err(LlmError::Connection("scripted failure".to_string())))
    }

    /// Fail the first `failures` calls, then answer `text`.
    pub fn flaky(failures: usize, text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, index| {
            if index < failures {
                Err(LlmError::Api("HTTP 503".to_string()))
            } else {
                Ok(text.clone())
            }
        })
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<InferenceRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, LlmError> {
        let index = self.count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = (self.responder)(request, index)?;
        Ok(InferenceResponse {
            text,
            usage: Self::USAGE,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
