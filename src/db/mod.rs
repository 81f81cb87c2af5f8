//! Database context layer for SQL Advisor.
//!
//! Provides a trait-based interface for the introspection an analysis needs
//! (schema, execution plan, sample rows), so the MariaDB backend and the
//! in-memory mock can be used interchangeably.

mod hints;
mod mariadb;
mod mock;
mod schema;
mod snapshot;
mod statement;
mod types;

pub use hints::{
    plan_hints, FILESORT_HINT, FULL_SCAN_HINT, PLAN_FAILED_HINT, TEMPORARY_HINT,
};
pub use mariadb::MariaDbClient;
pub use mock::{FailingDatabaseClient, MockDatabaseClient};
pub use schema::{Column, ForeignKey, Index, Schema};
pub use snapshot::{ContextSnapshot, SAMPLE_SKIPPED};
pub use statement::{has_top_level_limit, single_statement};
pub use types::{normalize_column_name, Fetched, Plan, Record, Sample};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// MariaDB or MySQL, over the MySQL wire protocol.
    #[default]
    #[serde(alias = "mysql")]
    MariaDb,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MariaDb => "mariadb",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mariadb" | "mysql" => Some(Self::MariaDb),
            _ => None,
        }
    }

    /// Returns the default port for this backend.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MariaDb => 3306,
        }
    }

    /// Returns the URL scheme the driver expects.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::MariaDb => "mysql",
        }
    }
}

/// Creates a database client for the given backend and configuration.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend {
        DatabaseBackend::MariaDb => {
            let client = MariaDbClient::connect(config).await?;
            Ok(Box::new(client))
        }
    }
}

/// A connected database that hands out request-scoped sessions.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Opens a session for one request.
    ///
    /// Failing here means the database cannot be reached at all, which is
    /// the only condition that aborts an analysis. The session is released
    /// when dropped.
    async fn session(&self) -> Result<Box<dyn ContextSession>>;

    /// Name of the target database, for reports.
    fn database_name(&self) -> &str;

    /// Closes the underlying connections.
    async fn close(&self) -> Result<()>;
}

/// Introspection operations available within one session.
#[async_trait]
pub trait ContextSession: Send {
    /// Columns, indexes, and foreign keys for the named tables. Unknown
    /// tables are omitted.
    async fn schema_for(&mut self, tables: &[String]) -> Result<Schema>;

    /// Columns, indexes, and foreign keys for every table in the database.
    async fn full_schema(&mut self) -> Result<Schema>;

    /// Execution plan for a statement. Never executes the statement.
    async fn explain(&mut self, statement: &str) -> Result<Plan>;

    /// Up to `limit` rows of the statement's result. Callers only pass read queries.
    async fn sample_rows(&mut self, statement: &str, limit: usize) -> Result<Sample>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(DatabaseBackend::parse("mariadb"), Some(DatabaseBackend::MariaDb));
        assert_eq!(DatabaseBackend::parse("MySQL"), Some(DatabaseBackend::MariaDb));
        assert_eq!(DatabaseBackend::parse("postgres"), None);
    }

    #[test]
    fn test_backend_defaults() {
        let backend = DatabaseBackend::default();
        assert_eq!(backend.as_str(), "mariadb");
        assert_eq!(backend.default_port(), 3306);
        assert_eq!(backend.url_scheme(), "mysql");
    }

    #[test]
    fn test_backend_deserialize_alias() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            backend: DatabaseBackend,
        }
        let parsed: Wrapper = toml::from_str("backend = \"mysql\"").unwrap();
        assert_eq!(parsed.backend, DatabaseBackend::MariaDb);
    }
}
