//! Multi-role statement analysis.
//!
//! Four advisor roles look at the same statement and context snapshot. Each
//! role is described by data (a prompt template and the fields it must
//! report) so one generic agent can run all of them.

pub mod agent;
pub mod orchestrator;
mod report;

pub use agent::run;
pub use orchestrator::{AnalysisConfig, Orchestrator};
pub use report::Report;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The advisor roles run for every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorRole {
    /// Rewrites the statement for a better execution plan.
    Optimizer,
    /// Suggests indexes and schema changes.
    SchemaAdvisor,
    /// Estimates relative cost and how to reduce it.
    CostAdvisor,
    /// Looks for data quality issues in the sample rows.
    DataValidator,
}

/// How a missing field is filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Defaults to `[]`.
    List,
    /// Defaults to `null`.
    Scalar,
}

/// One field of a role's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Whether a successful result must carry this field.
    pub required: bool,
}

const fn list(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::List,
        required: true,
    }
}

const fn scalar(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::Scalar,
        required: true,
    }
}

const fn optional(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::Scalar,
        required: false,
    }
}

const fn optional_list(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::List,
        required: false,
    }
}

const OPTIMIZER_FIELDS: &[Field] = &[
    scalar("optimized_query"),
    list("changes"),
    list("warnings"),
    scalar("estimated_impact"),
    optional("why_faster"),
    optional_list("engine_advice"),
    optional_list("materialization_advice"),
];

const SCHEMA_ADVISOR_FIELDS: &[Field] = &[
    list("recommended_indexes"),
    list("schema_changes"),
    list("warnings"),
];

const COST_ADVISOR_FIELDS: &[Field] = &[
    scalar("estimated_cost"),
    list("cost_saving_tips"),
    list("warnings"),
];

const DATA_VALIDATOR_FIELDS: &[Field] = &[
    list("issues"),
    scalar("confidence"),
    scalar("reasoning"),
];

impl AdvisorRole {
    /// Every role, in report order.
    pub const ALL: [AdvisorRole; 4] = [
        Self::Optimizer,
        Self::SchemaAdvisor,
        Self::CostAdvisor,
        Self::DataValidator,
    ];

    /// Returns the role's identifier as used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimizer => "optimizer",
            Self::SchemaAdvisor => "schema_advisor",
            Self::CostAdvisor => "cost_advisor",
            Self::DataValidator => "data_validator",
        }
    }

    /// Human-readable role name.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Optimizer => "Query Optimizer",
            Self::SchemaAdvisor => "Schema Advisor",
            Self::CostAdvisor => "Cost Advisor",
            Self::DataValidator => "Data Validator",
        }
    }

    /// The payload fields this role reports on success.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::Optimizer => OPTIMIZER_FIELDS,
            Self::SchemaAdvisor => SCHEMA_ADVISOR_FIELDS,
            Self::CostAdvisor => COST_ADVISOR_FIELDS,
            Self::DataValidator => DATA_VALIDATOR_FIELDS,
        }
    }

    /// Names of required payload fields missing from `payload`.
    pub fn missing_fields(&self, payload: &Map<String, Value>) -> Vec<&'static str> {
        self.fields()
            .iter()
            .filter(|field| field.required && !payload.contains_key(field.name))
            .map(|field| field.name)
            .collect()
    }
}

impl fmt::Display for AdvisorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an advisor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The role produced its analysis.
    Success,
    /// The statement is destructive; a read-only preview was produced instead.
    Unsafe,
    /// The gateway or extraction failed; `payload.error` says why.
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unsafe => "unsafe",
            Self::Error => "error",
        }
    }
}

/// The result of running one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub role: AdvisorRole,
    pub outcome: Outcome,

    /// Read-only rewrite of a destructive statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_preview: Option<String>,

    /// Role fields on success, `reasoning` when unsafe, diagnostics on error.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl AgentResult {
    /// A successful analysis.
    pub fn success(role: AdvisorRole, payload: Map<String, Value>) -> Self {
        Self {
            role,
            outcome: Outcome::Success,
            safe_preview: None,
            payload,
        }
    }

    /// A safe preview for a destructive statement.
    pub fn unsafe_preview(role: AdvisorRole, safe_preview: String, reasoning: Value) -> Self {
        let mut payload = Map::new();
        payload.insert("reasoning".to_string(), reasoning);
        Self {
            role,
            outcome: Outcome::Unsafe,
            safe_preview: Some(safe_preview),
            payload,
        }
    }

    /// A failed run. `raw_text` is the generated text, when any was received.
    pub fn error(role: AdvisorRole, message: impl Into<String>, raw_text: Option<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".to_string(), Value::String(message.into()));
        if let Some(raw_text) = raw_text {
            payload.insert("raw_text".to_string(), Value::String(raw_text));
        }
        Self {
            role,
            outcome: Outcome::Error,
            safe_preview: None,
            payload,
        }
    }

    /// Returns true if the role produced its analysis.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// The error message, for error results.
    pub fn error_message(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    /// The unparsed generated text, when extraction failed.
    pub fn raw_text(&self) -> Option<&str> {
        self.payload.get("raw_text").and_then(Value::as_str)
    }

    /// Looks up a payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }
}
