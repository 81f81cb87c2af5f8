//! Per-request context snapshot.
//!
//! Gathered once per analysis and shared read-only by every advisor role.
//! Each part degrades to an error marker on failure; nothing here aborts a
//! request.

use serde::Serialize;
use std::time::Instant;

use super::{plan_hints, ContextSession, Fetched, Plan, Sample, Schema};
use crate::safety::is_read_query;

/// Marker text used when sampling is skipped for a non-read statement.
pub const SAMPLE_SKIPPED: &str = "Sample rows are only fetched for read queries (SELECT/WITH)";

/// Schema, execution plan, and sample rows for one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    /// Column metadata for the requested tables, or the whole database.
    pub schema: Fetched<Schema>,

    /// `EXPLAIN` output for the statement.
    pub plan: Fetched<Plan>,

    /// A bounded sample of the statement's result rows.
    pub sample: Fetched<Sample>,

    /// Rule-based observations on `plan`.
    pub plan_hints: Vec<String>,
}

impl ContextSnapshot {
    /// Creates a snapshot from already-fetched parts, deriving the plan hints.
    pub fn new(schema: Fetched<Schema>, plan: Fetched<Plan>, sample: Fetched<Sample>) -> Self {
        let plan_hints = plan_hints(&plan);
        Self {
            schema,
            plan,
            sample,
            plan_hints,
        }
    }

    /// Gathers the snapshot for `statement` through an open session.
    ///
    /// Uses `tables` for the schema when given (and non-empty), otherwise the
    /// full database schema. Rows are only sampled for read queries.
    pub async fn gather(
        session: &mut dyn ContextSession,
        statement: &str,
        tables: Option<&[String]>,
        sample_limit: usize,
    ) -> Self {
        let start = Instant::now();

        let schema: Fetched<Schema> = match tables {
            Some(names) if !names.is_empty() => session.schema_for(names).await.into(),
            _ => session.full_schema().await.into(),
        };
        if let Some(error) = schema.error() {
            tracing::warn!(%error, "Schema unavailable");
        }

        let plan: Fetched<Plan> = session.explain(statement).await.into();
        if let Some(error) = plan.error() {
            tracing::warn!(%error, "Execution plan unavailable");
        }

        let sample: Fetched<Sample> = if is_read_query(statement) {
            session.sample_rows(statement, sample_limit).await.into()
        } else {
            Fetched::unavailable(SAMPLE_SKIPPED)
        };
        if let Some(error) = sample.error() {
            tracing::debug!(%error, "Sample rows unavailable");
        }

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            schema_ready = schema.is_ready(),
            plan_ready = plan.is_ready(),
            sample_ready = sample.is_ready(),
            "Context snapshot gathered"
        );

        Self::new(schema, plan, sample)
    }
}
