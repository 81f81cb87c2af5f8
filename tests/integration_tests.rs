//! Integration tests for SQL Advisor.
//!
//! Analysis tests run against the mock database and mock LLM clients.
//! Connection tests that need a live MariaDB server are skipped unless the
//! DATABASE_URL environment variable is set.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
