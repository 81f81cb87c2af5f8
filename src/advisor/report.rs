//! The consolidated analysis report.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{AdvisorRole, AgentResult};
use crate::db::{ContextSnapshot, Fetched, Plan, Sample};
use crate::safety::RiskVerdict;

/// Everything one analysis produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub original_statement: String,
    pub verdict: RiskVerdict,
    /// Name of the database the context came from.
    pub database: String,
    pub context: ContextSnapshot,
    /// One result per role.
    pub results: BTreeMap<AdvisorRole, AgentResult>,
    /// Plan for the optimizer's rewrite, when it proposed one.
    pub secondary_plan: Option<Fetched<Plan>>,
}

impl Report {
    /// The statement's execution plan.
    pub fn plan(&self) -> &Fetched<Plan> {
        &self.context.plan
    }

    /// The statement's sample rows.
    pub fn sample(&self) -> &Fetched<Sample> {
        &self.context.sample
    }

    pub fn result(&self, role: AdvisorRole) -> Option<&AgentResult> {
        self.results.get(&role)
    }

    /// The optimizer's rewrite, if it succeeded with a non-empty query.
    pub fn optimized_query(&self) -> Option<&str> {
        optimized_query(self.result(AdvisorRole::Optimizer))
    }
}

pub(super) fn optimized_query(result: Option<&AgentResult>) -> Option<&str> {
    result
        .filter(|result| result.is_success())
        .and_then(|result| result.field("optimized_query"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|query| !query.is_empty())
}

#[derive(Serialize)]
struct ReportView<'a> {
    original_statement: &'a str,
    verdict: &'a RiskVerdict,
    database: &'a str,
    context: &'a ContextSnapshot,
    plan: &'a Fetched<Plan>,
    sample: &'a Fetched<Sample>,
    results: &'a BTreeMap<AdvisorRole, AgentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary_plan: Option<&'a Fetched<Plan>>,
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportView {
            original_statement: &self.original_statement,
            verdict: &self.verdict,
            database: &self.database,
            context: &self.context,
            plan: self.plan(),
            sample: self.sample(),
            results: &self.results,
            secondary_plan: self.secondary_plan.as_ref(),
        }
        .serialize(serializer)
    }
}
