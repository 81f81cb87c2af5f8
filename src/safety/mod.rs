//! Statement safety classification.
//!
//! Scans SQL for data- and schema-mutating keywords. The verdict is
//! advisory: it never blocks analysis, it only switches every advisor role
//! onto the "safe read-only preview" prompt.

mod classifier;

pub use classifier::{classify, is_read_query, DESTRUCTIVE_KEYWORDS};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Result of classifying a single statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// True when at least one mutating keyword was found.
    pub is_destructive: bool,
    /// Lowercased keywords that matched.
    pub matched_keywords: BTreeSet<String>,
}

impl RiskVerdict {
    /// A verdict with no matches.
    pub fn safe() -> Self {
        Self::default()
    }

    /// Builds a verdict from the matched keywords.
    pub fn from_matches(matched_keywords: BTreeSet<String>) -> Self {
        Self {
            is_destructive: !matched_keywords.is_empty(),
            matched_keywords,
        }
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_destructive {
            let keywords = self
                .matched_keywords
                .iter()
                .map(|k| k.to_uppercase())
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "Destructive ({})", keywords)
        } else {
            write!(f, "Safe")
        }
    }
}
