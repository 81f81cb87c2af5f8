//! Error types for SQL Advisor.
//!
//! Defines the main error enum used throughout the crate. Only
//! [`AdvisorError::Connection`] ever aborts an analysis request; every other
//! variant is folded into the report as a placeholder or a per-role error.

use thiserror::Error;

/// Main error type for SQL Advisor operations.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Database unreachable (host down, auth failed, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A schema, plan, or sample query failed against a reachable database.
    #[error("Query error: {0}")]
    Query(String),

    /// Text generation backend errors (rate limits, auth, timeouts, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Generated text could not be turned into the expected structured value.
    #[error("Extraction error: {message}")]
    Extraction {
        /// What went wrong.
        message: String,
        /// The generated text, kept verbatim for diagnosis.
        raw_text: String,
    },

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdvisorError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates an extraction error that carries the unparsed text.
    pub fn extraction(msg: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the raw generated text if this is an extraction error.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::Extraction { raw_text, .. } => Some(raw_text),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Extraction { .. } => "Extraction Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using AdvisorError.
pub type Result<T> = std::result::Result<T, AdvisorError>;
