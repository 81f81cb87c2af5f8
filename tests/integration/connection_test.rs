//! Connection integration tests.
//!
//! Tests database connectivity, error handling, and live introspection.

use sql_advisor::config::ConnectionConfig;
use sql_advisor::db::{self, DatabaseClient, MariaDbClient};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<MariaDbClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    MariaDbClient::connect(&config).await.ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    assert!(!client.database_name().is_empty());
    client.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let config = ConnectionConfig {
        host: Some("invalid.host.that.does.not.exist.local".to_string()),
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        ..Default::default()
    };

    let result = db::connect(&config).await;
    assert!(result.is_err());

    let error = result.err().unwrap();
    assert_eq!(error.category(), "Connection Error");
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let config = ConnectionConfig {
        host: Some("127.0.0.1".to_string()),
        port: Some(59999), // Unlikely to be in use
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        ..Default::default()
    };

    let result = MariaDbClient::connect(&config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_without_database_name() {
    let result = MariaDbClient::connect(&ConnectionConfig::default()).await;
    let error = result.err().unwrap();
    assert_eq!(error.category(), "Configuration Error");
}

#[tokio::test]
async fn test_connection_roundtrip() {
    let original = ConnectionConfig {
        host: Some("localhost".to_string()),
        port: Some(3307),
        database: Some("shop".to_string()),
        user: Some("reader".to_string()),
        password: Some("p@ss#word".to_string()),
        ..Default::default()
    };

    let conn_str = original.to_connection_string().unwrap();
    let parsed = ConnectionConfig::from_connection_string(&conn_str).unwrap();

    assert_eq!(original, parsed);
}

#[tokio::test]
async fn test_live_session_context() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut session = client.session().await.unwrap();

    let schema = session.full_schema().await.unwrap();
    let restricted = session
        .schema_for(&["no_such_table_anywhere".to_string()])
        .await
        .unwrap();
    assert!(restricted.is_empty());
    assert!(schema.len() >= restricted.len());

    let plan = session.explain("SELECT 1").await.unwrap();
    assert!(!plan.is_empty());

    let sample = session.sample_rows("SELECT 1 AS one UNION SELECT 2", 1).await.unwrap();
    assert_eq!(sample.count, 1);

    let err = session.explain("SELECT 1; DROP TABLE users").await.unwrap_err();
    assert_eq!(err.category(), "Query Error");

    drop(session);
    client.close().await.unwrap();
}
