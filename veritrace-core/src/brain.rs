//! Brain module — completion provider abstraction.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the `Brain`
//! wrapper that turns a provider into a single-prompt `predict` capability,
//! and a queue-driven `MockLlmProvider` for tests.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Trait for completion providers.
///
/// A provider accepts a request and returns a single free-text reply. There is
/// no structured-output guarantee; callers parse replies defensively.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// The Brain wraps an LLM provider and adds prompt construction and usage tracking.
///
/// Every call is a single round trip: no retries, no streaming.
pub struct Brain {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<usize>,
    total_usage: Mutex<TokenUsage>,
    calls: Mutex<usize>,
}

impl Brain {
    pub fn new(provider: Arc<dyn LlmProvider>, system_prompt: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.into(),
            temperature: 0.7,
            max_tokens: None,
            total_usage: Mutex::new(TokenUsage::default()),
            calls: Mutex::new(0),
        }
    }

    /// Set the sampling temperature for subsequent calls.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Cap the number of generated tokens per call.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Construct messages for the LLM with the system prompt prepended.
    ///
    /// An empty system prompt is omitted entirely.
    pub fn build_messages(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.push(Message::user(prompt));
        messages
    }

    /// Send a single prompt and return the reply text, tracking usage.
    pub async fn predict(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages: self.build_messages(prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            model: None,
        };

        debug!(
            model = self.provider.model_name(),
            prompt_chars = prompt.len(),
            "Sending completion request"
        );

        let response = self.provider.complete(request).await?;
        self.track_usage(&response.usage);

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion received"
        );

        Ok(response.message.content)
    }

    fn track_usage(&self, usage: &TokenUsage) {
        if let Ok(mut total) = self.total_usage.lock() {
            total.accumulate(usage);
        }
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
    }

    /// Total token usage across all calls so far.
    pub fn total_usage(&self) -> TokenUsage {
        self.total_usage.lock().map(|u| *u).unwrap_or_default()
    }

    /// Number of completed calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or_default()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn provider_arc(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }
}

/// A mock LLM provider for testing and development.
///
/// Replies are served first-in first-out. Every received user prompt is
/// recorded so tests can assert on what was asked.
pub struct MockLlmProvider {
    model: String,
    responses: Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    /// The reply returned once the queue is exhausted.
    pub const FALLBACK_REPLY: &'static str = "I'm a mock LLM. No queued responses available.";

    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            responses: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that serves the given replies in order.
    pub fn with_responses<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let provider = Self::new();
        for reply in replies {
            provider.queue_text(reply.as_ref());
        }
        provider
    }

    /// Queue a text reply to be returned by the next `complete` call.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Ok(Self::text_response(text)));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.queue_response(Err(error));
    }

    fn queue_response(&self, response: Result<CompletionResponse, LlmError>) {
        self.responses.lock().unwrap().push(response);
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// All user prompts received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Some(prompt) = request.last_user_text() {
            self.prompts.lock().unwrap().push(prompt.to_string());
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(MockLlmProvider::text_response(Self::FALLBACK_REPLY))
        } else {
            responses.remove(0)
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
