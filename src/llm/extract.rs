//! Structured data extraction from generated text.
//!
//! Generated text often wraps the JSON it was asked for in prose or code
//! fences. [`extract`] tries an ordered cascade of candidate spans and
//! returns the first one that parses into the expected kind of value.

use serde_json::Value;
use tracing::debug;

use crate::error::{AdvisorError, Result};

/// The kind of value a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
    /// Any JSON value.
    #[default]
    Any,
}

impl Shape {
    /// Returns true if `value` has this shape.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    /// The shape of an existing value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            _ => Self::Any,
        }
    }
}

/// Recovers a JSON value of the expected shape from `text`.
///
/// Stages, in order:
/// 1. the first balanced `{...}` span (braces inside string literals are
///    ignored); if it does not parse, no later object in this stage is tried
/// 2. first `[` to last `]`
/// 3. first `{` to last `}`
/// 4. the whole text
///
/// A stage whose value parses but has the wrong shape is skipped. If every
/// stage fails, the error carries `text` unchanged.
pub fn extract(text: &str, shape: Shape) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(AdvisorError::extraction("Empty text", text));
    }

    let stages: [(&str, Option<&str>); 4] = [
        ("balanced object", first_balanced_object(text)),
        ("array span", widest_span(text, '[', ']')),
        ("object span", widest_span(text, '{', '}')),
        ("whole text", Some(text)),
    ];

    let mut last_error = None;
    for (stage, candidate) in stages {
        let Some(candidate) = candidate else {
            continue;
        };
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if shape.accepts(&value) => {
                debug!(stage, "Extracted structured value");
                return Ok(value);
            }
            Ok(_) => debug!(stage, ?shape, "Parsed value has the wrong shape"),
            Err(e) => last_error = Some(e),
        }
    }

    let reason = match last_error {
        Some(e) => format!("Could not parse JSON from text: {e}"),
        None => format!("No {shape:?} value found in text"),
    };
    Err(AdvisorError::extraction(reason, text))
}

/// Returns the first `{...}` span whose braces balance, skipping string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the span from the first `open` to the last `close`, inclusive.
fn widest_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
