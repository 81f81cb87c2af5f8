//! End-to-end analysis tests.
//!
//! Drive the orchestrator with the mock database and mock LLM clients.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sql_advisor::advisor::{AdvisorRole, AnalysisConfig, Orchestrator, Outcome};
use sql_advisor::db::{
    Column, FailingDatabaseClient, ForeignKey, Index, MockDatabaseClient, Record, Schema,
    FULL_SCAN_HINT, SAMPLE_SKIPPED,
};
use sql_advisor::llm::{FailingLlmClient, LlmClient, MockLlmClient};
use std::sync::Arc;

const OPTIMIZED: &str = "SELECT id, email FROM users WHERE active = 1";

fn user_row(id: i64, email: &str) -> Record {
    let mut record = Record::new();
    record.insert("id".to_string(), json!(id));
    record.insert("email".to_string(), json!(email));
    record
}

fn shop_db() -> MockDatabaseClient {
    MockDatabaseClient::new()
        .with_schema(
            Schema::new()
                .with_table(
                    "users",
                    vec![
                        Column::new("id", "int(11)").nullable(false).with_key("PRI"),
                        Column::new("email", "varchar(255)").with_key("UNI"),
                    ],
                )
                .with_table(
                    "orders",
                    vec![
                        Column::new("id", "int(11)").nullable(false).with_key("PRI"),
                        Column::new("user_id", "int(11)").with_key("MUL"),
                    ],
                ),
        )
        .with_rows(vec![
            user_row(1, "a@example.com"),
            user_row(2, "b@example.com"),
        ])
}

fn orchestrator(db: &MockDatabaseClient, llm: Arc<dyn LlmClient>) -> Orchestrator {
    Orchestrator::new(Arc::new(db.clone()), llm, AnalysisConfig::default())
}

fn optimizer_reply(query: &str) -> String {
    json!({
        "optimized_query": query,
        "why_faster": "Avoids reading unused columns",
        "changes": ["Replaced SELECT * with explicit columns"],
        "warnings": [],
        "estimated_impact": "medium"
    })
    .to_string()
}

#[tokio::test]
async fn test_select_with_default_replies() {
    let db = shop_db();
    let report = orchestrator(&db, Arc::new(MockLlmClient::new()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.original_statement, "SELECT * FROM users");
    assert!(!report.verdict.is_destructive);
    assert_eq!(report.database, "mockdb");
    assert_eq!(report.results.len(), 4);
    for role in AdvisorRole::ALL {
        let result = report.result(role).unwrap();
        assert_eq!(result.outcome, Outcome::Success, "{role}");
        for field in role.fields() {
            assert!(result.payload.contains_key(field.name), "{role}.{}", field.name);
        }
    }

    let schema = report.context.schema.as_ready().unwrap();
    assert_eq!(schema.len(), 2);
    assert_eq!(report.sample().as_ready().unwrap().count, 2);
    assert!(report.plan().is_ready());
    assert!(report.secondary_plan.is_none());
}

#[tokio::test]
async fn test_unparseable_replies_keep_raw_text_for_every_role() {
    let db = shop_db();
    let garbage = "I'm not able to produce JSON today.";
    let llm = MockLlmClient::new().with_response("SQL:", garbage);

    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    for role in AdvisorRole::ALL {
        let result = report.result(role).unwrap();
        assert_eq!(result.outcome, Outcome::Error, "{role}");
        assert_eq!(result.raw_text(), Some(garbage), "{role}");
        assert!(result.error_message().is_some(), "{role}");
    }
}

#[tokio::test]
async fn test_gateway_down_still_returns_report() {
    let db = shop_db();
    let report = orchestrator(&db, Arc::new(FailingLlmClient::new("Request timed out.")))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 4);
    for result in report.results.values() {
        assert_eq!(result.outcome, Outcome::Error);
        assert_eq!(result.error_message(), Some("LLM error: Request timed out."));
        assert!(result.raw_text().is_none());
    }
    assert!(report.context.schema.is_ready());
    assert!(report.secondary_plan.is_none());
}

#[tokio::test]
async fn test_destructive_statement_gets_safe_previews() {
    let db = shop_db();
    let llm = MockLlmClient::new();

    let report = orchestrator(&db, Arc::new(llm.clone()))
        .analyze("DELETE FROM users", None)
        .await
        .unwrap();

    assert!(report.verdict.is_destructive);
    assert!(report.verdict.matched_keywords.contains("delete"));

    for role in AdvisorRole::ALL {
        let result = report.result(role).unwrap();
        assert_eq!(result.outcome, Outcome::Unsafe, "{role}");
        assert_eq!(result.safe_preview.as_deref(), Some("SELECT * FROM users"));
        assert!(result.payload.contains_key("reasoning"));
    }

    let requests = llm.requests();
    assert_eq!(requests.len(), 4);
    for request in &requests {
        assert!(request[1].content.starts_with("The query below is unsafe:\nDELETE FROM users"));
    }

    // Analysis still gathered context, but never sampled a write
    assert_eq!(report.sample().error(), Some(SAMPLE_SKIPPED));
    assert_eq!(db.explained_statements(), vec!["DELETE FROM users"]);
    assert!(report.secondary_plan.is_none());
}

#[tokio::test]
async fn test_optimizer_rewrite_fetches_one_secondary_plan() {
    let db = shop_db();
    let llm = MockLlmClient::new().with_response("performance tuning", optimizer_reply(OPTIMIZED));

    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.optimized_query(), Some(OPTIMIZED));
    assert_eq!(
        db.explained_statements(),
        vec!["SELECT * FROM users".to_string(), OPTIMIZED.to_string()]
    );

    let plan = report.secondary_plan.as_ref().unwrap().as_ready().unwrap();
    assert_eq!(plan[0]["Extra"], json!(format!("mock plan for: {OPTIMIZED}")));
}

#[tokio::test]
async fn test_secondary_plan_failure_is_recorded() {
    let db = shop_db().failing_explain();
    let llm = MockLlmClient::new().with_response("performance tuning", optimizer_reply(OPTIMIZED));

    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert!(report.plan().error().is_some());
    let secondary = report.secondary_plan.as_ref().unwrap();
    assert!(secondary.error().unwrap().contains(OPTIMIZED));
    assert_eq!(db.explained_statements().len(), 2);
}

#[tokio::test]
async fn test_no_rewrite_means_no_secondary_plan() {
    let db = shop_db();
    let report = orchestrator(&db, Arc::new(MockLlmClient::new()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.optimized_query(), None);
    assert_eq!(db.explained_statements().len(), 1);

    let value = serde_json::to_value(&report).unwrap();
    assert!(value.get("secondary_plan").is_none());
}

#[tokio::test]
async fn test_unchanged_query_is_not_replanned() {
    let db = shop_db();
    let llm = MockLlmClient::new()
        .with_response("performance tuning", optimizer_reply("SELECT *\nFROM users;"));

    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.optimized_query(), Some("SELECT *\nFROM users;"));
    assert_eq!(db.explained_statements(), vec!["SELECT * FROM users".to_string()]);
    assert!(report.secondary_plan.is_none());
}

#[tokio::test]
async fn test_role_failures_are_isolated() {
    let db = shop_db();
    let baseline = orchestrator(&db, Arc::new(MockLlmClient::new()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    let llm = MockLlmClient::new().with_response("cost advisor", "no idea");
    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert_eq!(report.result(AdvisorRole::CostAdvisor).unwrap().outcome, Outcome::Error);
    for role in [
        AdvisorRole::Optimizer,
        AdvisorRole::SchemaAdvisor,
        AdvisorRole::DataValidator,
    ] {
        assert_eq!(report.result(role), baseline.result(role), "{role}");
    }
}

#[tokio::test]
async fn test_sequential_matches_concurrent() {
    let db = shop_db();
    let concurrent = orchestrator(&db, Arc::new(MockLlmClient::new()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    let sequential = Orchestrator::new(
        Arc::new(db.clone()),
        Arc::new(MockLlmClient::new()),
        AnalysisConfig {
            concurrent: false,
            ..Default::default()
        },
    )
    .analyze("SELECT * FROM users", None)
    .await
    .unwrap();

    assert_eq!(sequential.results, concurrent.results);
}

#[tokio::test]
async fn test_unreachable_database_is_fatal() {
    let orchestrator = Orchestrator::new(
        Arc::new(FailingDatabaseClient::new()),
        Arc::new(MockLlmClient::new()),
        AnalysisConfig::default(),
    );

    let err = orchestrator
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}

#[tokio::test]
async fn test_context_failures_become_placeholders() {
    let db = shop_db().failing_schema().failing_sample();
    let report = orchestrator(&db, Arc::new(MockLlmClient::new()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    assert!(report.context.schema.error().is_some());
    assert!(report.sample().error().is_some());
    assert!(report.plan().is_ready());
    assert!(report.results.values().all(|r| r.outcome == Outcome::Success));
}

#[tokio::test]
async fn test_session_released_after_analysis() {
    let db = shop_db();
    let llm = MockLlmClient::new().with_response("performance tuning", optimizer_reply(OPTIMIZED));
    let orchestrator = orchestrator(&db, Arc::new(llm));

    orchestrator.analyze("SELECT * FROM users", None).await.unwrap();
    orchestrator.analyze("UPDATE users SET email = NULL", None).await.unwrap();

    assert_eq!(db.sessions_opened(), 2);
    assert_eq!(db.open_sessions(), 0);
}

#[tokio::test]
async fn test_explicit_tables_restrict_schema_context() {
    let db = shop_db();
    let llm = MockLlmClient::new();
    let tables = vec!["orders".to_string()];

    let report = orchestrator(&db, Arc::new(llm.clone()))
        .analyze("SELECT * FROM orders", Some(&tables))
        .await
        .unwrap();

    let schema = report.context.schema.as_ready().unwrap();
    assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["orders"]);

    let schema_prompt = llm
        .requests()
        .into_iter()
        .find(|request| request[0].content.contains("Schema Advisor"))
        .unwrap();
    assert!(schema_prompt[1].content.contains("Table: orders"));
    assert!(!schema_prompt[1].content.contains("Table: users"));
}

#[tokio::test]
async fn test_existing_keys_reach_the_schema_advisor() {
    let db = MockDatabaseClient::new().with_schema(
        Schema::new()
            .with_table("orders", vec![Column::new("user_id", "int(11)").with_key("MUL")])
            .with_index("orders", Index::new("idx_user", vec!["user_id".to_string()]))
            .with_foreign_key(ForeignKey::new(
                "fk_orders_user",
                "orders",
                vec!["user_id".to_string()],
                "users",
                vec!["id".to_string()],
            )),
    );
    let llm = MockLlmClient::new();

    let report = orchestrator(&db, Arc::new(llm.clone()))
        .analyze("SELECT * FROM orders WHERE user_id = 7", None)
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(
        value["context"]["schema"]["indexes"]["orders"][0]["name"],
        "idx_user"
    );

    let schema_prompt = llm
        .requests()
        .into_iter()
        .find(|request| request[0].content.contains("Schema Advisor"))
        .unwrap();
    assert!(schema_prompt[1].content.contains("    - idx_user (user_id)\n"));
    assert!(schema_prompt[1]
        .content
        .contains("Foreign Keys:\n  - orders.user_id -> users.id\n"));
}

#[tokio::test]
async fn test_plan_hints_reach_plan_readers() {
    let db = shop_db();
    let llm = MockLlmClient::new();

    let report = orchestrator(&db, Arc::new(llm.clone()))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    // The default mock plan is a single full scan.
    assert_eq!(report.context.plan_hints, vec![FULL_SCAN_HINT]);

    let requests = llm.requests();
    let with_hints = |persona: &str| {
        requests
            .iter()
            .find(|request| request[0].content.contains(persona))
            .is_some_and(|request| request[1].content.contains(FULL_SCAN_HINT))
    };
    assert!(with_hints("performance tuning"));
    assert!(with_hints("Cost Advisor"));
    assert!(!with_hints("Data Validator"));
}

#[tokio::test]
async fn test_sample_limit_is_applied() {
    let db = shop_db();
    let report = Orchestrator::new(
        Arc::new(db.clone()),
        Arc::new(MockLlmClient::new()),
        AnalysisConfig {
            sample_limit: 1,
            ..Default::default()
        },
    )
    .analyze("SELECT * FROM users", None)
    .await
    .unwrap();

    assert_eq!(report.sample().as_ready().unwrap().count, 1);
}

#[tokio::test]
async fn test_report_json_shape() {
    let db = shop_db();
    let llm = MockLlmClient::new().with_response("performance tuning", optimizer_reply(OPTIMIZED));
    let report = orchestrator(&db, Arc::new(llm))
        .analyze("SELECT * FROM users", None)
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["original_statement"], "SELECT * FROM users");
    assert_eq!(value["verdict"], json!({"is_destructive": false, "matched_keywords": []}));
    assert_eq!(value["plan"], value["context"]["plan"]);
    assert_eq!(value["sample"]["count"], json!(2));
    assert_eq!(
        value["results"]["optimizer"]["payload"]["optimized_query"],
        Value::String(OPTIMIZED.to_string())
    );
    assert!(value["secondary_plan"].is_array());

    let roles: Vec<&String> = value["results"].as_object().unwrap().keys().collect();
    assert_eq!(
        roles,
        vec!["optimizer", "schema_advisor", "cost_advisor", "data_validator"]
    );
}
