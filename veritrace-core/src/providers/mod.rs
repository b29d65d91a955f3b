//! Completion provider implementations.
//!
//! Provides concrete implementations of the `LlmProvider` trait for
//! OpenAI-compatible APIs (OpenAI, Azure, Ollama, vLLM, LM Studio).
//!
//! Use `create_provider()` to instantiate the appropriate provider based on config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use openai_compat::OpenAiCompatibleProvider;

/// Providers that speak the OpenAI chat completions protocol.
const OPENAI_COMPATIBLE: &[&str] = &["openai", "azure", "ollama", "vllm", "lmstudio", "local"];

/// Create a completion provider based on the configuration.
///
/// Returns an error for unknown provider names or when the provider cannot
/// be initialized (e.g. a missing API key).
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let name = config.provider.to_lowercase();
    if OPENAI_COMPATIBLE.contains(&name.as_str()) {
        tracing::debug!(provider = %name, model = %config.model, "Creating OpenAI-compatible provider");
        Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
    } else {
        Err(LlmError::UnsupportedProvider {
            provider: config.provider.clone(),
        })
    }
}
