//! SQL Advisor - multi-role, LLM-backed advice for MariaDB SQL statements.

mod cli;
mod logging;

use anyhow::Context;
use cli::{AnalyzeArgs, Cli, Command, SchemaArgs};
use serde::Serialize;
use sql_advisor::advisor::Orchestrator;
use sql_advisor::config::Config;
use sql_advisor::db::{self, DatabaseClient};
use sql_advisor::llm;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = cli
        .resolve_config()
        .context("Failed to resolve configuration")?;

    info!("Connection: {}", config.database.display_string());
    let database: Arc<dyn DatabaseClient> = Arc::from(
        db::connect(&config.database)
            .await
            .with_context(|| format!("Failed to connect to {}", config.database.display_string()))?,
    );

    let result = match &cli.command {
        Command::Analyze(args) => analyze(args, &config, Arc::clone(&database)).await,
        Command::Schema(args) => schema(args, database.as_ref()).await,
    };

    database.close().await?;
    result
}

async fn analyze(
    args: &AnalyzeArgs,
    config: &Config,
    database: Arc<dyn DatabaseClient>,
) -> anyhow::Result<()> {
    let statement = args.statement()?;
    let llm: Arc<dyn llm::LlmClient> = Arc::from(
        llm::create_client(&config.llm).context("Failed to create LLM client")?,
    );
    info!(
        "LLM: {} ({})",
        config.llm.provider,
        config.llm.model_name()
    );

    let orchestrator = Orchestrator::new(database, llm, config.analysis.clone());
    let report = orchestrator
        .analyze(&statement, args.table_list())
        .await
        .context("Analysis failed")?;

    print_json(&report, args.compact)
}

async fn schema(args: &SchemaArgs, database: &dyn DatabaseClient) -> anyhow::Result<()> {
    let mut session = database.session().await?;
    let schema = if args.tables.is_empty() {
        session.full_schema().await?
    } else {
        session.schema_for(&args.tables).await?
    };

    if args.text {
        print!("{}", schema.format_for_llm());
        Ok(())
    } else {
        print_json(&schema, args.compact)
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
