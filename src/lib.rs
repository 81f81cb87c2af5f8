//! SQL Advisor - multi-role, LLM-backed advice for MariaDB SQL statements.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod advisor;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod safety;
