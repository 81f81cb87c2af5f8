//! Mock LLM clients for testing.
//!
//! Provides deterministic responses based on input patterns, and a client
//! that always fails.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{AdvisorError, Result};
use crate::llm::types::Message;
use crate::llm::LlmClient;

const SAFE_PREVIEW_REPLY: &str = r#"{"safe_preview": "SELECT * FROM users", "explanation": "Read-only preview of the rows the statement would touch."}"#;

const OPTIMIZER_REPLY: &str = r#"```json
{
  "optimized_query": "",
  "why_faster": "The mock gateway does not rewrite queries.",
  "changes": [],
  "warnings": ["Generated by the mock LLM client"],
  "estimated_impact": "low",
  "engine_advice": [],
  "materialization_advice": []
}
```"#;

const SCHEMA_ADVISOR_REPLY: &str = r#"{"recommended_indexes": [], "schema_changes": [], "warnings": ["Generated by the mock LLM client"]}"#;

const COST_ADVISOR_REPLY: &str = r#"Estimate follows.
{"estimated_cost": "low", "cost_saving_tips": [], "warnings": ["Generated by the mock LLM client"]}"#;

const DATA_VALIDATOR_REPLY: &str = r#"{"issues": [], "confidence": "low", "reasoning": "Generated by the mock LLM client"}"#;

const FALLBACK_REPLY: &str = "I don't understand that request. Could you please rephrase it?";

/// Mock LLM client that returns canned responses based on input patterns.
///
/// Every request is recorded so tests can inspect the prompts that were sent.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
    /// Requests received, in arrival order.
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the input contains `pattern`, the mock will return `response`.
    /// Mappings are checked in the order they were added.
    pub fn with_response(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.custom_responses.push((pattern.into(), response.into()));
        self
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        let reply = if input_lower.contains("query below is unsafe") {
            SAFE_PREVIEW_REPLY
        } else if input_lower.contains("performance tuning") {
            OPTIMIZER_REPLY
        } else if input_lower.contains("schema advisor") {
            SCHEMA_ADVISOR_REPLY
        } else if input_lower.contains("cost advisor") {
            COST_ADVISOR_REPLY
        } else if input_lower.contains("data validator") {
            DATA_VALIDATOR_REPLY
        } else {
            FALLBACK_REPLY
        };
        reply.to_string()
    }

    /// Joins every message so patterns can match the persona or the body.
    fn flatten(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        Ok(self.mock_response(&Self::flatten(messages)))
    }
}

/// LLM client whose every call fails, for exercising error paths.
#[derive(Debug, Clone)]
pub struct FailingLlmClient {
    message: String,
}

impl FailingLlmClient {
    /// Creates a client that fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Default for FailingLlmClient {
    fn default() -> Self {
        Self::new("Request timed out.")
    }
}

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        Err(AdvisorError::llm(self.message.clone()))
    }
}
