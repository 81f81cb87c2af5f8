//! Mock database clients for testing.
//!
//! Provides an in-memory context source that records the statements it was
//! asked to explain and tracks how many sessions are still open.

use super::{ContextSession, DatabaseClient, Plan, Record, Sample, Schema};
use crate::error::{AdvisorError, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    explained: Mutex<Vec<String>>,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
}

/// A mock database client that returns predefined context.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    schema: Schema,
    plan: Option<Plan>,
    rows: Vec<Record>,
    fail_schema: bool,
    fail_explain: bool,
    fail_sample: bool,
    state: Arc<MockState>,
}

impl MockDatabaseClient {
    /// Creates a new mock client with an empty schema and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema returned by schema lookups.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the plan returned by `explain`. Defaults to a single full-scan step.
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Sets the rows sampled by `sample_rows`.
    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    /// Makes schema lookups fail.
    pub fn failing_schema(mut self) -> Self {
        self.fail_schema = true;
        self
    }

    /// Makes `explain` fail (after recording the statement).
    pub fn failing_explain(mut self) -> Self {
        self.fail_explain = true;
        self
    }

    /// Makes `sample_rows` fail.
    pub fn failing_sample(mut self) -> Self {
        self.fail_sample = true;
        self
    }

    /// Statements passed to `explain`, in call order.
    pub fn explained_statements(&self) -> Vec<String> {
        self.state
            .explained
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Sessions opened and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions opened over the client's lifetime.
    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    fn default_plan(statement: &str) -> Plan {
        let mut step = Record::new();
        step.insert("id".to_string(), json!(1));
        step.insert("select_type".to_string(), json!("SIMPLE"));
        step.insert("type".to_string(), json!("ALL"));
        step.insert("rows".to_string(), json!(1000));
        step.insert("Extra".to_string(), json!(format!("mock plan for: {}", statement)));
        vec![step]
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn session(&self) -> Result<Box<dyn ContextSession>> {
        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            client: self.clone(),
        }))
    }

    fn database_name(&self) -> &str {
        "mockdb"
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MockSession {
    client: MockDatabaseClient,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.client.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContextSession for MockSession {
    async fn schema_for(&mut self, tables: &[String]) -> Result<Schema> {
        if self.client.fail_schema {
            return Err(AdvisorError::query("Mock schema lookup failed"));
        }
        Ok(self.client.schema.restricted_to(tables))
    }

    async fn full_schema(&mut self) -> Result<Schema> {
        if self.client.fail_schema {
            return Err(AdvisorError::query("Mock schema lookup failed"));
        }
        Ok(self.client.schema.clone())
    }

    async fn explain(&mut self, statement: &str) -> Result<Plan> {
        if let Ok(mut explained) = self.client.state.explained.lock() {
            explained.push(statement.to_string());
        }
        if self.client.fail_explain {
            return Err(AdvisorError::query(format!(
                "Mock EXPLAIN failed for: {}",
                statement
            )));
        }
        Ok(self
            .client
            .plan
            .clone()
            .unwrap_or_else(|| MockDatabaseClient::default_plan(statement)))
    }

    async fn sample_rows(&mut self, _statement: &str, limit: usize) -> Result<Sample> {
        if self.client.fail_sample {
            return Err(AdvisorError::query("Mock sample fetch failed"));
        }
        Ok(Sample::new(
            self.client.rows.iter().take(limit).cloned().collect(),
        ))
    }
}

/// A database client whose server is unreachable.
#[derive(Debug, Clone, Default)]
pub struct FailingDatabaseClient;

impl FailingDatabaseClient {
    /// Creates a new failing client.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseClient for FailingDatabaseClient {
    async fn session(&self) -> Result<Box<dyn ContextSession>> {
        Err(AdvisorError::connection(
            "Cannot connect to localhost:3306. Check that the server is running.",
        ))
    }

    fn database_name(&self) -> &str {
        "unreachable"
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
