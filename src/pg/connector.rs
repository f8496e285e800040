//! Pool connector for PostgreSQL.

use tracing::debug;

use super::connection::{PgConfig, PgConnection, QueryResult};
use crate::config::{Driver, PoolConfig};
use crate::error::{DbError, Result};
use crate::pool::Connector;

/// Opens [`PgConnection`]s and runs the session setup on each.
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: PgConfig,
    /// Run in order on every new connection.
    init_statements: Vec<String>,
}

impl PgConnector {
    pub fn new(config: PgConfig) -> Self {
        Self {
            config,
            init_statements: Vec::new(),
        }
    }

    /// Build a connector from a validated pool configuration.
    ///
    /// Explicit credentials override those in the URI. A schema becomes a
    /// `search_path` statement ahead of the init statement.
    pub fn from_pool_config(pool_config: &PoolConfig) -> Result<Self> {
        let mut config = PgConfig::from_url(&pool_config.connection_uri)
            .map_err(|e| DbError::ConfigError(e.to_string()))?;
        if let Some(user) = &pool_config.username {
            config.user = user.clone();
        }
        if let Some(password) = &pool_config.password {
            config.password = Some(password.clone());
        }

        let mut connector = Self::new(config);
        if let Some(schema) = pool_config.schema.as_deref().filter(|s| !s.is_empty()) {
            connector = connector.init_statement(format!("SET search_path TO {}", quote_ident(schema)));
        }
        if let Some(sql) = pool_config.init_sql(Driver::Postgres) {
            connector = connector.init_statement(sql);
        }
        Ok(connector)
    }

    pub fn init_statement(mut self, sql: impl Into<String>) -> Self {
        self.init_statements.push(sql.into());
        self
    }

    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    pub fn init_statements(&self) -> &[String] {
        &self.init_statements
    }
}

impl Connector for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection> {
        let mut conn = PgConnection::connect_with_config(self.config.clone()).await?;
        for sql in &self.init_statements {
            conn.simple_query(sql).await?;
        }
        Ok(conn)
    }

    async fn ping(&self, conn: &mut PgConnection) -> Result<()> {
        let results = conn.simple_query("SELECT 1").await?;
        if results.first().is_some_and(QueryResult::has_result_set) {
            Ok(())
        } else {
            Err(DbError::StatementError(
                "liveness query returned no result set".to_string(),
            ))
        }
    }

    /// A connection whose last request was abandoned mid-response counts
    /// as closed: the unread messages would be handed to the next caller.
    fn is_closed(&self, conn: &PgConnection) -> bool {
        conn.is_closed() || conn.has_pending_response()
    }

    async fn close(&self, mut conn: PgConnection) {
        if let Err(e) = conn.close().await {
            debug!(error = %e, "error closing postgres connection");
        }
    }
}

/// Quote an identifier for use in SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
