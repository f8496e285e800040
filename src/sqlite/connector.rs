//! Pool connector for SQLite.

use tracing::debug;

use super::connection::SqliteConnection;
use crate::config::{Driver, PoolConfig};
use crate::error::{DbError, Result};
use crate::pool::Connector;

#[derive(Debug, Clone)]
pub struct SqliteConnector {
    /// Path or `file:` URI handed to SQLite.
    path: String,
    init_sql: Option<String>,
}

impl SqliteConnector {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            init_sql: None,
        }
    }

    /// Build a connector from a validated pool configuration.
    ///
    /// Accepts `sqlite://path`, `sqlite:path` and `jdbc:sqlite:path`. An
    /// in-memory URI becomes a named shared-cache database so that every
    /// pooled connection sees the same data.
    pub fn from_pool_config(config: &PoolConfig) -> Result<Self> {
        let path = parse_uri(&config.connection_uri)?;
        let mut connector = Self::new(path);
        connector.init_sql = config.init_sql(Driver::Sqlite).map(str::to_string);
        Ok(connector)
    }

    pub fn init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn parse_uri(uri: &str) -> Result<String> {
    let uri = uri.strip_prefix("jdbc:").unwrap_or(uri);
    let rest = uri
        .strip_prefix("sqlite://")
        .or_else(|| uri.strip_prefix("sqlite:"))
        .ok_or_else(|| DbError::ConfigError(format!("not a sqlite URI: {}", uri)))?;

    match rest {
        "" => Err(DbError::ConfigError(format!("missing database path: {}", uri))),
        ":memory:" => Ok(format!(
            "file:dbkit-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        )),
        path => Ok(path.to_string()),
    }
}

impl Connector for SqliteConnector {
    type Connection = SqliteConnection;

    async fn connect(&self) -> Result<SqliteConnection> {
        let conn = SqliteConnection::open(&self.path).await?;
        if let Some(sql) = &self.init_sql {
            conn.execute_batch(sql).await?;
        }
        Ok(conn)
    }

    async fn ping(&self, conn: &mut SqliteConnection) -> Result<()> {
        let result = conn.query("SELECT 1", &[]).await?;
        if result.has_result_set() {
            Ok(())
        } else {
            Err(DbError::StatementError(
                "liveness query returned no result set".to_string(),
            ))
        }
    }

    fn is_closed(&self, conn: &SqliteConnection) -> bool {
        conn.is_closed()
    }

    async fn close(&self, mut conn: SqliteConnection) {
        if let Err(e) = conn.close().await {
            debug!(error = %e, "error closing sqlite connection");
        }
    }
}
