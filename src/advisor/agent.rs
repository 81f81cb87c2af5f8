//! Generic advisor agent.
//!
//! One agent runs any [`AdvisorRole`]: it picks the prompt from the risk
//! verdict, makes exactly one gateway call, and maps the extracted value
//! onto the role's payload fields. It never returns an error; every failure
//! becomes an [`Outcome::Error`](super::Outcome::Error) result.

use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{AdvisorRole, AgentResult, FieldKind};
use crate::db::ContextSnapshot;
use crate::llm::prompt::{build_messages, build_safe_preview_messages};
use crate::llm::{extract, LlmClient, Shape};
use crate::safety::RiskVerdict;

/// Runs one advisor role against the statement and its context.
pub async fn run(
    role: AdvisorRole,
    statement: &str,
    verdict: &RiskVerdict,
    snapshot: &ContextSnapshot,
    client: &dyn LlmClient,
) -> AgentResult {
    let start = Instant::now();

    let result = if verdict.is_destructive {
        run_safe_preview(role, statement, client).await
    } else {
        run_analysis(role, statement, snapshot, client).await
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match result.error_message() {
        Some(error) => warn!(%role, duration_ms, %error, "Advisor failed"),
        None => info!(%role, duration_ms, outcome = result.outcome.as_str(), "Advisor finished"),
    }

    result
}

async fn run_safe_preview(role: AdvisorRole, statement: &str, client: &dyn LlmClient) -> AgentResult {
    debug!(%role, "Requesting safe preview for destructive statement");

    let messages = build_safe_preview_messages(role, statement);
    let text = match client.complete(&messages).await {
        Ok(text) => text,
        Err(e) => return AgentResult::error(role, e.to_string(), None),
    };

    let value = match extract(&text, Shape::Object) {
        Ok(value) => value,
        Err(e) => return AgentResult::error(role, e.to_string(), Some(text)),
    };

    match value.get("safe_preview").and_then(Value::as_str) {
        Some(preview) => {
            let reasoning = value.get("explanation").cloned().unwrap_or(Value::Null);
            AgentResult::unsafe_preview(role, preview.to_string(), reasoning)
        }
        None => AgentResult::error(role, "Reply has no safe_preview string", Some(text)),
    }
}

async fn run_analysis(
    role: AdvisorRole,
    statement: &str,
    snapshot: &ContextSnapshot,
    client: &dyn LlmClient,
) -> AgentResult {
    let messages = build_messages(role, statement, snapshot);
    let text = match client.complete(&messages).await {
        Ok(text) => text,
        Err(e) => return AgentResult::error(role, e.to_string(), None),
    };

    match extract(&text, Shape::Object) {
        Ok(value) => AgentResult::success(role, role_payload(role, &value)),
        Err(e) => AgentResult::error(role, e.to_string(), Some(text)),
    }
}

/// Copies the role's fields out of `value`, defaulting the missing ones.
fn role_payload(role: AdvisorRole, value: &Value) -> Map<String, Value> {
    role.fields()
        .iter()
        .map(|field| {
            let default = match field.kind {
                FieldKind::List => Value::Array(Vec::new()),
                FieldKind::Scalar => Value::Null,
            };
            let present = value.get(field.name).cloned().unwrap_or(default);
            (field.name.to_string(), present)
        })
        .collect()
}
