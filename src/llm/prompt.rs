//! Prompt construction for advisor requests.
//!
//! Each role gets a system message naming its persona and a user message
//! with the statement, the context slices that role works from, and the
//! JSON shape it must answer with.

use crate::advisor::AdvisorRole;
use crate::db::{ContextSnapshot, Fetched, Schema};
use crate::llm::types::Message;

const OPTIMIZER_PERSONA: &str =
    "You are a world-class SQL performance tuning agent specialized in MariaDB/MySQL.";
const SCHEMA_ADVISOR_PERSONA: &str = "You are a Schema Advisor for MariaDB/MySQL.";
const COST_ADVISOR_PERSONA: &str = "You are a Cost Advisor for MariaDB.";
const DATA_VALIDATOR_PERSONA: &str = "You are a Data Validator.";

const OPTIMIZER_TASK: &str = r#"Your role: optimize SQL queries for performance and cost.

Rules (MariaDB):
- Rewrite the query only if the execution plan will improve (not just formatting).
- Detect and avoid: full table scans, cross joins, filesort/temp tables, unnecessary GROUP BY/ORDER BY.
- Recommend B-Tree indexes and composite indexes where appropriate.
- Recommend avoiding SELECT *; prefer explicit columns.
- Consider using temporary tables or materialized strategies for reuse-heavy subqueries.
- Estimate qualitative impact (low/medium/high) and explain why.

Return STRICT JSON ONLY with the following keys:
{
  "optimized_query": "...",
  "why_faster": "...",
  "changes": ["..."],
  "warnings": ["..."],
  "estimated_impact": "low|medium|high",
  "engine_advice": ["MariaDB specific advice ..."],
  "materialization_advice": ["..."]
}"#;

const SCHEMA_ADVISOR_TASK: &str = r#"Task:
Suggest schema improvements (indexes, partitioning, column types) to make this query faster.
Return JSON ONLY:
{
  "recommended_indexes": ["CREATE INDEX ..."],
  "schema_changes": ["ALTER TABLE ..."],
  "warnings": ["..."]
}"#;

const COST_ADVISOR_TASK: &str = r#"Estimate relative cost/IO/runtime and give concrete tips to reduce cost.
Return JSON ONLY:
{
  "estimated_cost": "low|medium|high or numeric",
  "cost_saving_tips": ["..."],
  "warnings": ["..."]
}"#;

const DATA_VALIDATOR_TASK: &str = r#"Inspect sample rows for data quality issues (missing values, wrong datatypes, suspicious outliers) and return JSON ONLY:
{
  "issues": ["..."],
  "confidence": "high|medium|low",
  "reasoning": "..."
}"#;

const SAFE_PREVIEW_TEMPLATE: &str = r#"The query below is unsafe:
{statement}

Return JSON with a safe SELECT preview and explanation:
{ "safe_preview": "SELECT ...", "explanation": "..." }"#;

/// Context slices a role's prompt includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSlices {
    pub schema: bool,
    pub plan: bool,
    pub sample: bool,
}

/// Returns which parts of the snapshot `role` is shown.
pub fn context_slices(role: AdvisorRole) -> ContextSlices {
    match role {
        AdvisorRole::Optimizer => ContextSlices {
            schema: true,
            plan: true,
            sample: true,
        },
        AdvisorRole::SchemaAdvisor => ContextSlices {
            schema: true,
            plan: false,
            sample: false,
        },
        AdvisorRole::CostAdvisor => ContextSlices {
            schema: false,
            plan: true,
            sample: false,
        },
        AdvisorRole::DataValidator => ContextSlices {
            schema: false,
            plan: false,
            sample: true,
        },
    }
}

fn persona(role: AdvisorRole) -> &'static str {
    match role {
        AdvisorRole::Optimizer => OPTIMIZER_PERSONA,
        AdvisorRole::SchemaAdvisor => SCHEMA_ADVISOR_PERSONA,
        AdvisorRole::CostAdvisor => COST_ADVISOR_PERSONA,
        AdvisorRole::DataValidator => DATA_VALIDATOR_PERSONA,
    }
}

fn task(role: AdvisorRole) -> &'static str {
    match role {
        AdvisorRole::Optimizer => OPTIMIZER_TASK,
        AdvisorRole::SchemaAdvisor => SCHEMA_ADVISOR_TASK,
        AdvisorRole::CostAdvisor => COST_ADVISOR_TASK,
        AdvisorRole::DataValidator => DATA_VALIDATOR_TASK,
    }
}

fn render_schema(schema: &Fetched<Schema>) -> String {
    match schema {
        Fetched::Ready(schema) => schema.format_for_llm(),
        Fetched::Unavailable { .. } => schema.to_prompt_json(),
    }
}

/// Renders the analysis prompt body for a non-destructive statement.
pub fn build_analysis_prompt(
    role: AdvisorRole,
    statement: &str,
    snapshot: &ContextSnapshot,
) -> String {
    let slices = context_slices(role);
    let mut prompt = format!("SQL:\n{}\n", statement.trim());

    if slices.schema {
        prompt.push_str(&format!("\nSCHEMA:\n{}", render_schema(&snapshot.schema)));
    }
    if slices.plan {
        prompt.push_str(&format!(
            "\nEXPLAIN:\n{}\n",
            snapshot.plan.to_prompt_json()
        ));
        if !snapshot.plan_hints.is_empty() {
            prompt.push_str("\nPLAN_HINTS:\n");
            for hint in &snapshot.plan_hints {
                prompt.push_str(&format!("- {}\n", hint));
            }
        }
    }
    if slices.sample {
        prompt.push_str(&format!(
            "\nSAMPLE_ROWS:\n{}\n",
            snapshot.sample.to_prompt_json()
        ));
    }

    prompt.push('\n');
    prompt.push_str(task(role));
    prompt
}

/// Renders the prompt asking for a read-only preview of a destructive statement.
pub fn build_safe_preview_prompt(statement: &str) -> String {
    SAFE_PREVIEW_TEMPLATE.replace("{statement}", statement.trim())
}

/// Builds the message list for a role's analysis request.
pub fn build_messages(role: AdvisorRole, statement: &str, snapshot: &ContextSnapshot) -> Vec<Message> {
    vec![
        Message::system(persona(role)),
        Message::user(build_analysis_prompt(role, statement, snapshot)),
    ]
}

/// Builds the message list for a role's safe-preview request.
pub fn build_safe_preview_messages(role: AdvisorRole, statement: &str) -> Vec<Message> {
    vec![
        Message::system(persona(role)),
        Message::user(build_safe_preview_prompt(statement)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Column, Index, Plan, Record, Sample, FULL_SCAN_HINT};
    use crate::llm::types::Role;
    use serde_json::json;

    fn snapshot() -> ContextSnapshot {
        let schema = Schema::new().with_table(
            "users",
            vec![Column::new("id", "int(11)").nullable(false).with_key("PRI")],
        );
        let mut step = Record::new();
        step.insert("type".to_string(), json!("ALL"));
        let plan: Plan = vec![step];
        let mut row = Record::new();
        row.insert("email".to_string(), json!("a@example.com"));

        ContextSnapshot::new(
            Fetched::Ready(schema),
            Fetched::Ready(plan),
            Fetched::Ready(Sample::new(vec![row])),
        )
    }

    #[test]
    fn test_optimizer_sees_everything() {
        let prompt = build_analysis_prompt(AdvisorRole::Optimizer, "SELECT * FROM users", &snapshot());
        assert!(prompt.contains("SQL:\nSELECT * FROM users"));
        assert!(prompt.contains("Table: users"));
        assert!(prompt.contains("\"type\": \"ALL\""));
        assert!(prompt.contains("a@example.com"));
        assert!(prompt.contains("\"optimized_query\""));
        assert!(prompt.contains("\"materialization_advice\""));
        assert!(prompt.contains("materialized strategies"));
    }

    #[test]
    fn test_plan_hints_follow_the_plan() {
        let snap = snapshot();
        let hint = format!("PLAN_HINTS:\n- {}\n", FULL_SCAN_HINT);

        let optimizer = build_analysis_prompt(AdvisorRole::Optimizer, "SELECT 1", &snap);
        assert!(optimizer.contains(&hint));
        let cost = build_analysis_prompt(AdvisorRole::CostAdvisor, "SELECT 1", &snap);
        assert!(cost.contains(&hint));

        let schema = build_analysis_prompt(AdvisorRole::SchemaAdvisor, "SELECT 1", &snap);
        assert!(!schema.contains("PLAN_HINTS:"));
    }

    #[test]
    fn test_schema_prompt_lists_existing_indexes() {
        let schema = Schema::new()
            .with_table("users", vec![Column::new("email", "varchar(255)")])
            .with_index("users", Index::new("uq_email", vec!["email".to_string()]).unique(true));
        let snap = ContextSnapshot::new(
            Fetched::Ready(schema),
            Fetched::Ready(Vec::new()),
            Fetched::Ready(Sample::new(Vec::new())),
        );

        let prompt = build_analysis_prompt(AdvisorRole::SchemaAdvisor, "SELECT 1", &snap);
        assert!(prompt.contains("  Indexes:\n    - uq_email (email) UNIQUE\n"));
    }

    #[test]
    fn test_roles_see_only_their_slices() {
        let snap = snapshot();

        let schema = build_analysis_prompt(AdvisorRole::SchemaAdvisor, "SELECT 1", &snap);
        assert!(schema.contains("Table: users"));
        assert!(!schema.contains("EXPLAIN:"));
        assert!(!schema.contains("SAMPLE_ROWS:"));

        let cost = build_analysis_prompt(AdvisorRole::CostAdvisor, "SELECT 1", &snap);
        assert!(cost.contains("EXPLAIN:"));
        assert!(!cost.contains("SCHEMA:"));

        let validator = build_analysis_prompt(AdvisorRole::DataValidator, "SELECT 1", &snap);
        assert!(validator.contains("SAMPLE_ROWS:"));
        assert!(!validator.contains("EXPLAIN:"));
    }

    #[test]
    fn test_unavailable_context_is_rendered_as_marker() {
        let snap = ContextSnapshot::new(
            Fetched::unavailable("Query error: no such table"),
            Fetched::unavailable("Query error: syntax"),
            Fetched::unavailable("skipped"),
        );
        let prompt = build_analysis_prompt(AdvisorRole::Optimizer, "SELECT 1", &snap);
        assert!(prompt.contains("\"error\": \"Query error: no such table\""));
        assert!(prompt.contains("\"error\": \"skipped\""));
    }

    #[test]
    fn test_safe_preview_prompt() {
        let prompt = build_safe_preview_prompt("  DELETE FROM users  ");
        assert!(prompt.starts_with("The query below is unsafe:\nDELETE FROM users\n"));
        assert!(prompt.contains("\"safe_preview\""));
    }

    #[test]
    fn test_message_layout() {
        let messages = build_safe_preview_messages(AdvisorRole::CostAdvisor, "DROP TABLE t");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, COST_ADVISOR_PERSONA);
        assert_eq!(messages[1].role, Role::User);

        let messages = build_messages(AdvisorRole::DataValidator, "SELECT 1", &snapshot());
        assert_eq!(messages[0].content, DATA_VALIDATOR_PERSONA);
        assert!(messages[1].content.contains("data quality"));
    }
}
