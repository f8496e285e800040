//! Statement execution over a pooled data source.
//!
//! `DataSource` hides which driver backs the pool: parameters go in as
//! [`Value`]s and rows come back as [`Row`]s of `Value`s.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::codec::ColumnCodec;
use crate::config::{Driver, PoolConfig};
use crate::error::{DbError, Result};
use crate::pg::{PgConnector, PgValue};
use crate::pool::{Pool, PoolStatus, PooledConnection};
use crate::sql::{Column, Dialect};
use crate::sqlite::{SqliteConnector, SqliteValue};
use crate::value::Value;

// ============================================================================
// Results
// ============================================================================

/// A result row.
///
/// Values are stored inline for rows of up to 16 columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: SmallVec<[Value; 16]>,
}

impl Row {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// Decode the value at `idx` with `codec`.
    pub fn decode<C: ColumnCodec>(&self, idx: usize, codec: &C) -> Result<C::Value> {
        let value = self
            .get(idx)
            .cloned()
            .ok_or_else(|| DbError::StatementError(format!("no column at index {}", idx)))?;
        Ok(codec.decode_wire(value)?)
    }

    /// Decode the value of `column`, looked up by name. `NULL` becomes `None`.
    pub fn column<C: ColumnCodec>(&self, column: &Column<C>) -> Result<Option<C::Value>> {
        let value = self
            .get_by_name(column.name())
            .cloned()
            .ok_or_else(|| DbError::StatementError(format!("no column named {}", column.name())))?;
        Ok(column.decode_nullable(value)?)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values.into_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<Row>,
    /// Rows changed by a statement without a result set.
    pub rows_affected: u64,
}

impl QueryResult {
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(0))
    }

    fn from_rows<T>(
        columns: Vec<String>,
        rows: Vec<Vec<T>>,
        rows_affected: u64,
        convert: impl Fn(T) -> Value,
    ) -> Self {
        let columns = Arc::new(columns);
        let rows = rows
            .into_iter()
            .map(|row| Row {
                columns: Arc::clone(&columns),
                values: row.into_iter().map(&convert).collect(),
            })
            .collect();
        Self {
            columns,
            rows,
            rows_affected,
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A connection checked out of a [`DataSource`]. Returned to the pool on drop.
pub enum Connection {
    Postgres(PooledConnection<PgConnector>),
    Sqlite(PooledConnection<SqliteConnector>),
}

impl Connection {
    pub fn dialect(&self) -> Dialect {
        match self {
            Connection::Postgres(_) => Dialect::Postgres,
            Connection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    pub async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        debug!(sql, params = params.len(), "query");
        match self {
            Connection::Postgres(conn) => {
                let pg_params: Vec<PgValue> = params.iter().cloned().map(Value::into_pg).collect();
                let result = conn.query(sql, &pg_params).await?;
                let rows_affected = if result.has_result_set() {
                    0
                } else {
                    result.rows_affected()
                };
                let columns = result.columns.iter().map(|f| f.name.clone()).collect();
                Ok(QueryResult::from_rows(
                    columns,
                    result.rows,
                    rows_affected,
                    Value::from_pg,
                ))
            }
            Connection::Sqlite(conn) => {
                let sqlite_params: Vec<SqliteValue> =
                    params.iter().cloned().map(Value::into_sqlite).collect();
                let result = conn.query(sql, &sqlite_params).await?;
                Ok(QueryResult::from_rows(
                    result.columns,
                    result.rows,
                    result.rows_affected,
                    Value::from_sqlite,
                ))
            }
        }
    }

    /// Run a statement and return the number of rows it changed.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        debug!(sql, params = params.len(), "execute");
        match self {
            Connection::Postgres(conn) => {
                let pg_params: Vec<PgValue> = params.iter().cloned().map(Value::into_pg).collect();
                Ok(conn.query(sql, &pg_params).await?.rows_affected())
            }
            Connection::Sqlite(conn) => {
                let sqlite_params: Vec<SqliteValue> =
                    params.iter().cloned().map(Value::into_sqlite).collect();
                Ok(conn.execute(sql, &sqlite_params).await?)
            }
        }
    }
}

// ============================================================================
// Data Source
// ============================================================================

/// Cloneable handle to a connection pool.
///
/// Clones share the same pool, so any number of tasks may acquire and release
/// connections through their own copy.
#[derive(Clone)]
pub enum DataSource {
    Postgres(Pool<PgConnector>),
    Sqlite(Pool<SqliteConnector>),
}

impl DataSource {
    /// Validate `config` and create its pool.
    pub async fn connect(config: &PoolConfig) -> Result<Self> {
        let driver = config.validate()?;
        let options = config.pool_options();
        match driver {
            Driver::Postgres => {
                let connector = PgConnector::from_pool_config(config)?;
                Ok(DataSource::Postgres(Pool::new(connector, options).await?))
            }
            Driver::Sqlite => {
                let connector = SqliteConnector::from_pool_config(config)?;
                Ok(DataSource::Sqlite(Pool::new(connector, options).await?))
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DataSource::Postgres(_) => Dialect::Postgres,
            DataSource::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Check out a connection, waiting up to the acquisition timeout.
    pub async fn acquire(&self) -> Result<Connection> {
        match self {
            DataSource::Postgres(pool) => pool.acquire().await.map(Connection::Postgres),
            DataSource::Sqlite(pool) => pool.acquire().await.map(Connection::Sqlite),
        }
    }

    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.acquire().await?.query(sql, params).await
    }

    /// First row of the result, if any.
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params).await?.rows.into_iter().next())
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.acquire().await?.execute(sql, params).await
    }

    /// Acquire a connection and run the liveness query on it.
    pub async fn check_ready(&self) -> Result<()> {
        match self {
            DataSource::Postgres(pool) => pool.check_ready().await,
            DataSource::Sqlite(pool) => pool.check_ready().await,
        }
    }

    pub fn status(&self) -> PoolStatus {
        match self {
            DataSource::Postgres(pool) => pool.status(),
            DataSource::Sqlite(pool) => pool.status(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            DataSource::Postgres(pool) => pool.is_closed(),
            DataSource::Sqlite(pool) => pool.is_closed(),
        }
    }

    pub async fn close(&self) {
        match self {
            DataSource::Postgres(pool) => pool.close().await,
            DataSource::Sqlite(pool) => pool.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{GeographyCodec, GeographyPoint};

    fn row(values: Vec<Value>) -> Row {
        Row {
            columns: Arc::new(vec!["id".to_string(), "location".to_string()]),
            values: values.into(),
        }
    }

    #[test]
    fn test_row_access() {
        let r = row(vec![Value::Int(1), Value::Text("POINT(2 1)".into())]);
        assert_eq!(r.get_by_name("id"), Some(&Value::Int(1)));
        assert_eq!(r.get_by_name("missing"), None);
        assert_eq!(
            r.decode(1, &GeographyCodec::default()).unwrap(),
            GeographyPoint::new(1.0, 2.0)
        );
        assert!(matches!(
            r.decode(5, &GeographyCodec::default()),
            Err(DbError::StatementError(_))
        ));
    }

    #[test]
    fn test_row_column_handles_null() {
        let location = Column::new("location", GeographyCodec::default());
        assert_eq!(row(vec![Value::Int(1), Value::Null]).column(&location).unwrap(), None);
        assert!(matches!(
            row(vec![Value::Int(1), Value::Int(3)]).column(&location),
            Err(DbError::Decode(_))
        ));
    }

    async fn sqlite_source() -> DataSource {
        DataSource::connect(&PoolConfig::new("sqlite", "sqlite::memory:").max_pool_size(2))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_query_helpers() {
        let source = sqlite_source().await;
        assert_eq!(source.dialect(), Dialect::Sqlite);

        source
            .execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", &[])
            .await
            .unwrap();
        let changed = source
            .execute(
                "INSERT INTO notes (id, body) VALUES (?1, ?2), (?3, ?4)",
                &[1.into(), "one".into(), 2.into(), "two".into()],
            )
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let result = source
            .query("SELECT body FROM notes ORDER BY id", &[])
            .await
            .unwrap();
        assert!(result.has_result_set());
        assert_eq!(result.scalar(), Some(&Value::Text("one".into())));

        let missing = source
            .query_one("SELECT body FROM notes WHERE id = ?1", &[9.into()])
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_connection_returns_to_pool() {
        let source = sqlite_source().await;
        {
            let mut conn = source.acquire().await.unwrap();
            assert_eq!(conn.dialect(), Dialect::Sqlite);
            conn.query("SELECT 1", &[]).await.unwrap();
            assert_eq!(source.status().in_use, 1);
        }
        assert_eq!(source.status().in_use, 0);
        source.check_ready().await.unwrap();

        source.close().await;
        assert!(source.is_closed());
        assert!(matches!(source.acquire().await, Err(DbError::PoolClosed)));
    }
}
