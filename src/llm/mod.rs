//! Text generation gateway for SQL Advisor.
//!
//! Provides the gateway trait, its Anthropic and mock implementations, the
//! advisor prompt builder, and the structured extractor for replies.

pub mod anthropic;
pub mod extract;
pub mod factory;
pub mod mock;
pub mod prompt;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use extract::{extract, Shape};
pub use factory::create_client;
pub use mock::{FailingLlmClient, MockLlmClient};
pub use types::{Message, Role};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) so one client can serve
/// every advisor role concurrently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages.
    ///
    /// Returns the complete response as a single string.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic (Claude)
    #[default]
    Anthropic,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
