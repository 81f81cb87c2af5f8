//! Anthropic LLM client implementation.
//!
//! Implements the LlmClient trait for Anthropic's Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{AdvisorError, Result};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Anthropic API base URL.
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version header.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Maximum tokens to generate.
pub const DEFAULT_MAX_TOKENS: u32 = 1200;

/// Anthropic client configuration.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Endpoint; overridable for proxies.
    pub api_url: String,
}

impl AnthropicConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the endpoint URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// Anthropic LLM client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicClient {
    /// Creates a new Anthropic client with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Returns the configured model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Extracts the system message and converts remaining messages to Anthropic format.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system = None;
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                // Anthropic uses a separate system parameter
                Role::System => system = Some(msg.content.clone()),
                Role::User | Role::Assistant => converted.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        (system, converted)
    }

    /// Parses an API error response.
    fn parse_error(status: reqwest::StatusCode, body: &str) -> AdvisorError {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return AdvisorError::llm("Authentication failed. Check your ANTHROPIC_API_KEY.");
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return AdvisorError::llm("Rate limited. Please wait and try again.");
        }

        if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(body) {
            return AdvisorError::llm(format!(
                "Anthropic API error: {}",
                error_response.error.message
            ));
        }

        AdvisorError::llm(format!("Anthropic API error ({}): {}", status, body))
    }

    /// Joins the text blocks of a response.
    fn response_text(response: AnthropicResponse) -> Result<String> {
        let text = response
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .map(|block| block.text)
            .collect::<String>();

        if text.is_empty() {
            return Err(AdvisorError::llm("No response from Anthropic"));
        }

        Ok(text)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let (system, converted_messages) = Self::convert_messages(messages);

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: converted_messages,
        };

        debug!(model = %self.config.model, "Sending Anthropic request");

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisorError::llm("Request timed out.")
                } else if e.is_connect() {
                    AdvisorError::llm("Failed to connect to Anthropic API. Check your network.")
                } else {
                    AdvisorError::llm(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdvisorError::llm(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error(status, &body));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| AdvisorError::llm(format!("Failed to parse response: {}", e)))?;

        Self::response_text(response)
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}
