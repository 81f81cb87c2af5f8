//! Integration tests for SQL Advisor.

pub mod analysis_test;
pub mod connection_test;
