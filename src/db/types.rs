//! Context value types for SQL Advisor.
//!
//! Plans and samples are kept as loosely-typed JSON records: their column
//! sets vary by server version and by statement, and they are only ever
//! relayed to prompts and reports.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::Result;

/// One row of a result set, keyed by column name in column order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// An execution plan: the rows returned by `EXPLAIN`, in order.
pub type Plan = Vec<Record>;

/// A bounded sample of the rows a statement returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sample {
    /// Sampled rows, with aggregate column names normalized.
    pub rows: Vec<Record>,

    /// Number of rows in `rows`.
    pub count: usize,
}

impl Sample {
    /// Creates a sample from rows.
    pub fn new(rows: Vec<Record>) -> Self {
        let count = rows.len();
        Self { rows, count }
    }

    /// Returns true if the sample holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A context value that was either fetched or replaced by an error marker.
///
/// Serializes as the value itself, or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fetched<T> {
    /// The value was fetched.
    Ready(T),
    /// The fetch failed or was skipped; the message says why.
    Unavailable { error: String },
}

impl<T> Fetched<T> {
    /// Creates an error marker.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable { error: msg.into() }
    }

    /// Returns the fetched value, if any.
    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns true if the value was fetched.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the error marker message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable { error } => Some(error),
        }
    }
}

impl<T> From<Result<T>> for Fetched<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Ready(value),
            Err(e) => Self::unavailable(e.to_string()),
        }
    }
}

impl<T: Serialize> Fetched<T> {
    /// Pretty JSON for prompts. Never fails; serialization errors are inlined.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("{{\"error\": \"unserializable context: {}\"}}", e))
    }
}

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("non-word pattern is valid"));

/// Turns a result column label into a plain identifier.
///
/// Aggregate labels such as `COUNT(*)` or `SUM(amount)` become
/// `total_count` and `sum_amount`; anything else is lowercased with
/// non-word runs collapsed to `_`.
pub fn normalize_column_name(label: &str) -> String {
    let replaced = label
        .replace("COUNT(*)", "total_count")
        .replace("SUM(", "sum_")
        .replace(')', "")
        .replace("AVG(", "avg_")
        .replace("MAX(", "max_")
        .replace("MIN(", "min_");

    let cleaned = NON_WORD
        .replace_all(&replaced, "_")
        .trim_matches('_')
        .to_lowercase();

    if cleaned.is_empty() {
        label.to_string()
    } else {
        cleaned
    }
}
