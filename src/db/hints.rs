//! Rule-based hints derived from an execution plan.
//!
//! These are cheap, deterministic observations on MariaDB's tabular
//! `EXPLAIN` output. They are shown to the roles that read the plan and
//! included in the report alongside it.

use super::{Fetched, Plan, Record};

pub const FULL_SCAN_HINT: &str =
    "Consider adding indexes on WHERE/join columns to avoid full scans.";
pub const FILESORT_HINT: &str = "Query uses filesort; optimize ORDER BY with indexes.";
pub const TEMPORARY_HINT: &str =
    "Query creates temp table; consider rewriting joins or subqueries.";
pub const PLAN_FAILED_HINT: &str = "Execution plan unavailable; check the statement syntax.";

/// Returns the hints that apply to `plan`, each at most once.
pub fn plan_hints(plan: &Fetched<Plan>) -> Vec<String> {
    let steps = match plan {
        Fetched::Ready(steps) => steps,
        Fetched::Unavailable { .. } => return vec![PLAN_FAILED_HINT.to_string()],
    };

    let full_scan = steps
        .iter()
        .any(|step| field(step, "type").is_some_and(|t| t.eq_ignore_ascii_case("ALL")));
    let extra = |needle: &str| {
        steps.iter().any(|step| {
            field(step, "Extra").is_some_and(|extra| extra.to_lowercase().contains(needle))
        })
    };

    [
        (full_scan, FULL_SCAN_HINT),
        (extra("filesort"), FILESORT_HINT),
        (extra("temporary"), TEMPORARY_HINT),
    ]
    .into_iter()
    .filter(|(applies, _)| *applies)
    .map(|(_, hint)| hint.to_string())
    .collect()
}

/// Looks up a plan column by name, ignoring case.
fn field<'a>(step: &'a Record, name: &str) -> Option<&'a str> {
    step.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}
