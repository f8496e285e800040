//! SQLite connection running on a dedicated thread via tokio-rusqlite.

use tokio_rusqlite::Connection;

use super::error::{SqliteError, SqliteResult};
use super::types::SqliteValue;

#[derive(Debug)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqliteValue>>,
    /// Rows changed by the statement, 0 for pure queries.
    pub rows_affected: u64,
}

impl QueryResult {
    /// Whether the statement produced a result set (even an empty one).
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

pub struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqliteConnection {
    /// Open a SQLite database.
    ///
    /// `path` is a file path, `:memory:`, or a `file:` URI such as
    /// `file:name?mode=memory&cache=shared`. File databases are switched to
    /// WAL mode.
    pub async fn open(path: &str) -> SqliteResult<Self> {
        let is_memory = path == ":memory:" || path.contains("mode=memory");
        let conn = if path == ":memory:" {
            Connection::open_in_memory().await?
        } else {
            Connection::open(path).await?
        };

        conn.call(move |c| {
            c.busy_timeout(std::time::Duration::from_millis(5000))?;
            if !is_memory {
                c.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;",
                )?;
            }
            Ok(())
        })
        .await?;

        Ok(Self { conn: Some(conn) })
    }

    fn handle(&self) -> SqliteResult<&Connection> {
        self.conn.as_ref().ok_or(SqliteError::ConnectionClosed)
    }

    /// Run a statement and collect its rows. Statements are prepared
    /// through the connection's statement cache.
    pub async fn query(&self, sql: &str, params: &[SqliteValue]) -> SqliteResult<QueryResult> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.handle()?
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|s| s.to_string()).collect();

                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

                let mut rows_data = Vec::new();
                let mut rows = stmt.query(params_refs.as_slice())?;
                while let Some(row) = rows.next()? {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..columns.len() {
                        values.push(SqliteValue::from_value_ref(row.get_ref(i)?));
                    }
                    rows_data.push(values);
                }
                drop(rows);

                let rows_affected = if columns.is_empty() { conn.changes() as u64 } else { 0 };
                Ok(QueryResult {
                    columns,
                    rows: rows_data,
                    rows_affected,
                })
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Run a statement that returns no rows and report the changed row count.
    pub async fn execute(&self, sql: &str, params: &[SqliteValue]) -> SqliteResult<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.handle()?
            .call(move |conn| {
                let params_refs: Vec<&dyn rusqlite::ToSql> =
                    params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
                let mut stmt = conn.prepare_cached(&sql)?;
                Ok(stmt.execute(params_refs.as_slice())? as u64)
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Run several `;`-separated statements (DDL, session setup).
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();

        self.handle()?
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(SqliteError::from)
    }

    /// Stop the connection thread and close the database handle.
    pub async fn close(&mut self) -> SqliteResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().await.map_err(SqliteError::from),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}
