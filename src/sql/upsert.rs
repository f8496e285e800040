//! Insert-or-update statements.
//!
//! On a conflict against the key column every column of the table is
//! overwritten with the proposed row, the key itself included.

use super::{Column, Dialect, Table};
use crate::codec::ColumnCodec;
use crate::error::{DbError, Result};
use crate::executor::{Connection, DataSource};
use crate::value::Value;

/// Build the upsert text for `assigned` columns of `table`, with one bind
/// placeholder per assigned column in order.
pub fn build_upsert(dialect: Dialect, table: &Table, key: &str, assigned: &[&str]) -> Result<String> {
    if !table.has_column(key) {
        return Err(DbError::StatementError(format!(
            "conflict key {} is not a column of {}",
            key,
            table.name()
        )));
    }
    if assigned.is_empty() {
        return Err(DbError::StatementError(format!(
            "upsert into {} assigns no columns",
            table.name()
        )));
    }
    for (i, column) in assigned.iter().enumerate() {
        if !table.has_column(column) {
            return Err(DbError::StatementError(format!(
                "{} is not a column of {}",
                column,
                table.name()
            )));
        }
        if assigned[..i].contains(column) {
            return Err(DbError::StatementError(format!("{} is assigned twice", column)));
        }
    }

    let placeholders: Vec<String> = (1..=assigned.len()).map(|i| dialect.placeholder(i)).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        assigned.join(", "),
        placeholders.join(", ")
    );

    let setters: Vec<String> = table
        .columns()
        .iter()
        .map(|c| match dialect {
            Dialect::Postgres => format!("{0} = EXCLUDED.{0}", c.name),
            Dialect::Sqlite => format!("{0} = excluded.{0}", c.name),
            Dialect::MySql => format!("{0} = VALUES({0})", c.name),
        })
        .collect();

    Ok(match dialect {
        Dialect::MySql => format!("{} ON DUPLICATE KEY UPDATE {}", insert, setters.join(", ")),
        _ => format!(
            "{} ON CONFLICT ({}) DO UPDATE SET {}",
            insert,
            key,
            setters.join(", ")
        ),
    })
}

/// Builder for a single upsert execution.
///
/// ```no_run
/// # async fn run(source: dbkit::DataSource) -> dbkit::Result<()> {
/// use dbkit::sql::{Table, Upsert};
///
/// let mut users = Table::new("users");
/// users.plain("id", "integer primary key").plain("name", "text");
///
/// let changed = Upsert::new(&users, "id")
///     .set_column("id", 1)
///     .set_column("name", "Ada")
///     .execute(&source)
///     .await?;
/// assert_eq!(changed, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Upsert<'t> {
    table: &'t Table,
    key: String,
    assignments: Vec<(String, Value)>,
}

impl<'t> Upsert<'t> {
    pub fn new(table: &'t Table, key: impl Into<String>) -> Self {
        Self {
            table,
            key: key.into(),
            assignments: Vec::new(),
        }
    }

    /// Assign a codec-typed column. Fails if the codec rejects the value.
    pub fn set<C: ColumnCodec>(self, column: &Column<C>, value: &C::Value) -> Result<Self> {
        let encoded = column.encode(value)?;
        Ok(self.set_column(column.name(), encoded))
    }

    /// Assign a raw value. A second assignment to a column replaces the first.
    pub fn set_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.assignments.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.assignments.push((name, value)),
        }
        self
    }

    pub fn sql(&self, dialect: Dialect) -> Result<String> {
        let assigned: Vec<&str> = self.assignments.iter().map(|(n, _)| n.as_str()).collect();
        build_upsert(dialect, self.table, &self.key, &assigned)
    }

    /// Bind values in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.assignments.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Run on a pooled connection and return the affected-row count.
    pub async fn execute(&self, source: &DataSource) -> Result<u64> {
        let sql = self.sql(source.dialect())?;
        source.execute(&sql, &self.params()).await
    }

    /// Run on an already checked-out connection.
    pub async fn execute_on(&self, conn: &mut Connection) -> Result<u64> {
        let sql = self.sql(conn.dialect())?;
        conn.execute(&sql, &self.params()).await
    }
}
