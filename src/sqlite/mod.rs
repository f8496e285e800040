//! SQLite driver: rusqlite on a dedicated thread through tokio-rusqlite.

pub mod connection;
pub mod connector;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{QueryResult, SqliteConnection};
pub use connector::SqliteConnector;
pub use error::{SqliteError, SqliteResult};
pub use types::SqliteValue;
