//! Analysis orchestration.
//!
//! Classifies the statement, gathers the context snapshot, runs every
//! advisor role, and assembles the report. Role failures are isolated; only
//! an unreachable database fails the request.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::report::optimized_query;
use super::{agent, AdvisorRole, AgentResult, Outcome, Report};
use crate::db::{ContextSnapshot, DatabaseClient, Fetched, Plan};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::safety::{classify, RiskVerdict};

/// Default number of sample rows.
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Per-analysis settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum rows fetched for the sample.
    pub sample_limit: usize,
    /// Run roles concurrently instead of one after another.
    pub concurrent: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            concurrent: true,
        }
    }
}

/// Runs analyses against one database and one gateway.
pub struct Orchestrator {
    database: Arc<dyn DatabaseClient>,
    llm: Arc<dyn LlmClient>,
    config: AnalysisConfig,
}

impl Orchestrator {
    pub fn new(
        database: Arc<dyn DatabaseClient>,
        llm: Arc<dyn LlmClient>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            database,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes one statement.
    ///
    /// `tables` restricts the schema context; without it the whole database
    /// schema is used. Fails only when no database session can be opened.
    pub async fn analyze(&self, statement: &str, tables: Option<&[String]>) -> Result<Report> {
        let start = Instant::now();
        let verdict = classify(statement);
        info!(
            destructive = verdict.is_destructive,
            database = self.database.database_name(),
            "Analyzing statement"
        );

        let mut session = self.database.session().await?;
        let context =
            ContextSnapshot::gather(&mut *session, statement, tables, self.config.sample_limit)
                .await;

        let results: BTreeMap<AdvisorRole, AgentResult> = self
            .run_roles(statement, &verdict, &context)
            .await
            .into_iter()
            .map(validate_result)
            .map(|result| (result.role, result))
            .collect();

        let rewrite = optimized_query(results.get(&AdvisorRole::Optimizer))
            .filter(|query| is_rewrite(statement, query));
        let secondary_plan = match rewrite {
            Some(query) => {
                debug!("Fetching plan for optimized query");
                let plan: Fetched<Plan> = session.explain(query).await.into();
                if let Some(error) = plan.error() {
                    warn!(%error, "Plan for optimized query unavailable");
                }
                Some(plan)
            }
            None => None,
        };
        drop(session);

        info!(
            duration_ms = start.elapsed().as_millis() as u64,
            failed_roles = results.values().filter(|r| r.outcome == Outcome::Error).count(),
            "Analysis complete"
        );

        Ok(Report {
            original_statement: statement.to_string(),
            verdict,
            database: self.database.database_name().to_string(),
            context,
            results,
            secondary_plan,
        })
    }

    async fn run_roles(
        &self,
        statement: &str,
        verdict: &RiskVerdict,
        context: &ContextSnapshot,
    ) -> Vec<AgentResult> {
        let llm = self.llm.as_ref();

        if self.config.concurrent {
            join_all(
                AdvisorRole::ALL
                    .into_iter()
                    .map(|role| agent::run(role, statement, verdict, context, llm)),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(AdvisorRole::ALL.len());
            for role in AdvisorRole::ALL {
                results.push(agent::run(role, statement, verdict, context, llm).await);
            }
            results
        }
    }
}

/// Returns true if `candidate` differs from `statement` beyond whitespace and
/// trailing semicolons.
fn is_rewrite(statement: &str, candidate: &str) -> bool {
    let normalize = |sql: &str| {
        sql.trim()
            .trim_end_matches(';')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    };
    normalize(statement) != normalize(candidate)
}

/// Replaces a result that lacks the fields its outcome requires with an error result.
pub fn validate_result(result: AgentResult) -> AgentResult {
    let missing: Vec<&str> = match result.outcome {
        Outcome::Success => result.role.missing_fields(&result.payload),
        Outcome::Unsafe => {
            let mut missing = Vec::new();
            if result.safe_preview.is_none() {
                missing.push("safe_preview");
            }
            if !result.payload.contains_key("reasoning") {
                missing.push("reasoning");
            }
            missing
        }
        Outcome::Error if !result.payload.contains_key("error") => vec!["error"],
        Outcome::Error => Vec::new(),
    };

    if missing.is_empty() {
        return result;
    }

    warn!(role = %result.role, ?missing, "Malformed advisor result");
    AgentResult::error(
        result.role,
        format!(
            "Malformed {} result: missing {}",
            result.outcome.as_str(),
            missing.join(", ")
        ),
        None,
    )
}
