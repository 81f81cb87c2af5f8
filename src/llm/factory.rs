//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use crate::config::LlmConfig;
use crate::error::{AdvisorError, Result};
use crate::llm::{AnthropicClient, AnthropicConfig, LlmClient, LlmProvider, MockLlmClient};

/// Creates an LLM client from the resolved configuration.
///
/// The Anthropic API key is resolved in order:
/// 1. `config.api_key`
/// 2. `ANTHROPIC_API_KEY`
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Anthropic => {
            let key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    AdvisorError::config(
                        "No API key configured. Set ANTHROPIC_API_KEY or use --mock-llm.",
                    )
                })?;
            let client_config = AnthropicConfig::new(key, config.model_name())
                .with_timeout(config.timeout_secs)
                .with_max_tokens(config.max_tokens);
            Ok(Box::new(AnthropicClient::new(client_config)?))
        }
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
    }
}
