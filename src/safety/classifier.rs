//! Keyword-based classification logic.
//!
//! Keywords match anywhere in the statement in any letter case, so
//! identifiers containing one (`updated_at`, `softdeleted`) count as well.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use super::RiskVerdict;

/// Keywords that mark a statement as destructive.
pub const DESTRUCTIVE_KEYWORDS: [&str; 5] = ["delete", "update", "drop", "truncate", "alter"];

static DESTRUCTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(delete|update|drop|truncate|alter)")
        .expect("destructive keyword pattern is valid")
});

/// Classifies a statement. Pure and infallible.
pub fn classify(statement: &str) -> RiskVerdict {
    let matched: BTreeSet<String> = DESTRUCTIVE_PATTERN
        .find_iter(statement)
        .map(|m| m.as_str().to_lowercase())
        .collect();

    RiskVerdict::from_matches(matched)
}

/// Returns true if the statement starts like a read query (`SELECT` or `WITH`).
///
/// Used to decide whether sample rows may be fetched; this is a textual
/// prefix check only.
pub fn is_read_query(statement: &str) -> bool {
    let trimmed = statement.trim_start().trim_start_matches('(').trim_start();
    let head: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_lowercase();
    head == "select" || head == "with"
}
