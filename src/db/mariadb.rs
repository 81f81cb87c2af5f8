//! MariaDB database client implementation.
//!
//! Provides the `MariaDbClient` struct that implements the `DatabaseClient`
//! trait for MariaDB/MySQL servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::{
    has_top_level_limit, normalize_column_name, single_statement, Column, ContextSession,
    DatabaseClient, ForeignKey, Index, Plan, Record, Sample, Schema,
};
use crate::error::{AdvisorError, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Decimal;
use sqlx::{Column as SqlxColumn, Decode, FromRow, Row as SqlxRow, Type, TypeInfo};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Column metadata for the current database, one row per column.
const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR),
        CAST(COLUMN_NAME AS CHAR),
        CAST(COLUMN_TYPE AS CHAR),
        CAST(IS_NULLABLE AS CHAR),
        CAST(COLUMN_KEY AS CHAR)
    FROM information_schema.columns
    WHERE table_schema = DATABASE()
"#;

const COLUMNS_ORDER: &str = "ORDER BY TABLE_NAME, ORDINAL_POSITION";

/// Index columns for the current database, one row per indexed column.
const INDEXES_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR),
        CAST(INDEX_NAME AS CHAR),
        CAST(COLUMN_NAME AS CHAR),
        CAST(NON_UNIQUE AS SIGNED)
    FROM information_schema.statistics
    WHERE table_schema = DATABASE()
"#;

const INDEXES_ORDER: &str = "ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX";

/// Foreign key columns for the current database.
const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        CAST(CONSTRAINT_NAME AS CHAR),
        CAST(TABLE_NAME AS CHAR),
        CAST(COLUMN_NAME AS CHAR),
        CAST(REFERENCED_TABLE_NAME AS CHAR),
        CAST(REFERENCED_COLUMN_NAME AS CHAR)
    FROM information_schema.key_column_usage
    WHERE table_schema = DATABASE()
        AND REFERENCED_TABLE_NAME IS NOT NULL
"#;

const FOREIGN_KEYS_ORDER: &str = "ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION";

type ColumnRow = (String, String, String, String, String);

/// `COLUMN_NAME` is NULL for expression indexes.
type IndexRow = (String, String, Option<String>, i64);

type ForeignKeyRow = (String, String, String, String, String);

/// MariaDB database client.
#[derive(Debug)]
pub struct MariaDbClient {
    pool: MySqlPool,
    database: String,
}

impl MariaDbClient {
    /// Creates a new client from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Connects to the configured server, retrying transient failures with
    /// exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let database = config.database.clone().unwrap_or_default();

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(&conn_str)
                .await;

            match result {
                Ok(pool) => {
                    debug!("Successfully connected to database");
                    return Ok(Self { pool, database });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, config),
            None => AdvisorError::internal("No connection attempt was made"),
        })
    }
}

#[async_trait]
impl DatabaseClient for MariaDbClient {
    async fn session(&self) -> Result<Box<dyn ContextSession>> {
        let conn = self.pool.acquire().await.map_err(|e| {
            AdvisorError::connection(format!("Failed to acquire a database connection: {e}"))
        })?;
        Ok(Box::new(MariaDbSession { conn }))
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// One pooled connection; returned to the pool on drop.
struct MariaDbSession {
    conn: PoolConnection<MySql>,
}

impl MariaDbSession {
    /// Runs one `information_schema` query, optionally restricted to `tables`.
    async fn fetch_metadata<T>(
        &mut self,
        base: &str,
        order: &str,
        tables: Option<&[String]>,
        what: &str,
    ) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let sql = match tables {
            Some(names) => {
                let placeholders = vec!["?"; names.len()].join(", ");
                format!("{base} AND TABLE_NAME IN ({placeholders}) {order}")
            }
            None => format!("{base} {order}"),
        };

        let mut query = sqlx::query_as::<_, T>(&sql);
        for name in tables.unwrap_or_default() {
            query = query.bind(name);
        }

        with_timeout(query.fetch_all(&mut *self.conn))
            .await?
            .map_err(|e| AdvisorError::query(format!("Failed to fetch {what}: {e}")))
    }

    async fn load_schema(&mut self, tables: Option<&[String]>) -> Result<Schema> {
        let columns: Vec<ColumnRow> = self
            .fetch_metadata(COLUMNS_QUERY, COLUMNS_ORDER, tables, "columns")
            .await?;

        // Columns alone still make a usable schema.
        let indexes: Vec<IndexRow> = self
            .fetch_metadata(INDEXES_QUERY, INDEXES_ORDER, tables, "indexes")
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Index metadata unavailable");
                Vec::new()
            });
        let foreign_keys: Vec<ForeignKeyRow> = self
            .fetch_metadata(FOREIGN_KEYS_QUERY, FOREIGN_KEYS_ORDER, tables, "foreign keys")
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Foreign key metadata unavailable");
                Vec::new()
            });

        Ok(build_schema(columns, indexes, foreign_keys))
    }
}

#[async_trait]
impl ContextSession for MariaDbSession {
    async fn schema_for(&mut self, tables: &[String]) -> Result<Schema> {
        if tables.is_empty() {
            return Ok(Schema::new());
        }
        self.load_schema(Some(tables)).await
    }

    async fn full_schema(&mut self) -> Result<Schema> {
        self.load_schema(None).await
    }

    async fn explain(&mut self, statement: &str) -> Result<Plan> {
        let statement = single_statement(statement)?;
        let sql = format!("EXPLAIN {statement}");

        let rows = with_timeout(sqlx::query(&sql).fetch_all(&mut *self.conn))
            .await?
            .map_err(|e| AdvisorError::query(format_query_error(e)))?;

        Ok(rows.iter().map(|row| convert_row(row, false)).collect())
    }

    async fn sample_rows(&mut self, statement: &str, limit: usize) -> Result<Sample> {
        let statement = single_statement(statement)?;
        let sql = if has_top_level_limit(statement) {
            statement.to_string()
        } else {
            format!("SELECT * FROM ({statement}) AS subq LIMIT {limit}")
        };

        // The statement's own LIMIT may be larger than ours; stop reading
        // after `limit` rows either way.
        let rows: Vec<MySqlRow> = with_timeout(
            sqlx::query(&sql)
                .fetch(&mut *self.conn)
                .take(limit)
                .try_collect::<Vec<_>>(),
        )
        .await?
        .map_err(|e| {
            AdvisorError::query(format!("Sample row fetch failed: {}", format_query_error(e)))
        })?;

        debug!(rows = rows.len(), limit, "Sample rows fetched");

        Ok(Sample::new(
            rows.iter().map(|row| convert_row(row, true)).collect(),
        ))
    }
}

/// Assembles a schema from `information_schema` rows.
///
/// Index and foreign key rows must be ordered so that the columns of one
/// index or constraint are adjacent and in key order.
fn build_schema(
    columns: Vec<ColumnRow>,
    indexes: Vec<IndexRow>,
    foreign_keys: Vec<ForeignKeyRow>,
) -> Schema {
    let mut schema = Schema::from_columns(columns.into_iter().map(
        |(table, name, column_type, is_nullable, key)| {
            let column = Column::new(name, column_type)
                .nullable(is_nullable == "YES")
                .with_key(key);
            (table, column)
        },
    ));

    let mut grouped_indexes: Vec<(String, Index)> = Vec::new();
    for (table, name, column, non_unique) in indexes {
        let Some(column) = column else {
            continue;
        };
        if let Some((last_table, index)) = grouped_indexes.last_mut() {
            if *last_table == table && index.name == name {
                index.columns.push(column);
                continue;
            }
        }
        let index = Index::new(name, vec![column]).unique(non_unique == 0);
        grouped_indexes.push((table, index));
    }
    for (table, index) in grouped_indexes {
        schema = schema.with_index(table, index);
    }

    let mut grouped_keys: Vec<ForeignKey> = Vec::new();
    for (name, table, column, to_table, to_column) in foreign_keys {
        if let Some(fk) = grouped_keys.last_mut() {
            if fk.from_table == table && fk.name == name {
                fk.from_columns.push(column);
                fk.to_columns.push(to_column);
                continue;
            }
        }
        grouped_keys.push(ForeignKey::new(
            name,
            table,
            vec![column],
            to_table,
            vec![to_column],
        ));
    }
    for foreign_key in grouped_keys {
        schema = schema.with_foreign_key(foreign_key);
    }

    schema
}

/// Runs a database future under the query timeout.
async fn with_timeout<F, T>(future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(QUERY_TIMEOUT_SECS), future)
        .await
        .map_err(|_| {
            AdvisorError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })
}

/// Converts a sqlx MySqlRow to a JSON record.
fn convert_row(row: &MySqlRow, normalize_names: bool) -> Record {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let name = if normalize_names {
                normalize_column_name(col.name())
            } else {
                col.name().to_string()
            };
            (name, convert_value(row, i, col.type_info().name()))
        })
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value from a MySqlRow to a JSON value.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let upper = type_name.to_uppercase();
    let unsigned = upper.ends_with(" UNSIGNED");
    let base = upper.trim_end_matches(" UNSIGNED");

    let value = match base {
        "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
            decode::<u64>(row, index).map(Value::from)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decode::<i64>(row, index).map(Value::from)
        }

        "FLOAT" => decode::<f32>(row, index).map(|v| Value::from(v as f64)),
        "DOUBLE" => decode::<f64>(row, index).map(Value::from),
        "DECIMAL" => decode::<Decimal>(row, index).map(|v| Value::String(v.to_string())),

        "DATE" => decode::<NaiveDate>(row, index).map(|v| Value::String(v.to_string())),
        "DATETIME" => decode::<NaiveDateTime>(row, index).map(|v| Value::String(v.to_string())),
        "TIMESTAMP" => decode::<DateTime<Utc>>(row, index).map(|v| Value::String(v.to_rfc3339())),
        "TIME" => decode::<NaiveTime>(row, index).map(|v| Value::String(v.to_string())),

        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            decode::<Vec<u8>>(row, index).map(|bytes| match String::from_utf8(bytes) {
                Ok(text) => Value::String(text),
                Err(e) => Value::String(format!("<{} bytes>", e.as_bytes().len())),
            })
        }

        // For all other types, try to get as string
        _ => decode::<String>(row, index).map(Value::String).or_else(|| {
            row.try_get_unchecked::<Option<String>, _>(index)
                .ok()
                .flatten()
                .map(Value::String)
        }),
    };

    value.unwrap_or(Value::Null)
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("access denied")
        || error_str.contains("unknown database")
        || error_str.contains("ssl")
        || error_str.contains("tls")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("too many connections")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> AdvisorError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        AdvisorError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        AdvisorError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        AdvisorError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        AdvisorError::connection(
            "TLS negotiation failed. Add '?ssl-mode=disabled' or configure the server certificate."
                .to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        AdvisorError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        AdvisorError::connection(error.to_string())
    }
}

/// Formats a query error, preferring the server's own message and code.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("ERROR {}: {}", code, db_error.message()),
            None => format!("ERROR: {}", db_error.message()),
        },
        None => error.to_string(),
    }
}
