//! PostgreSQL v3 wire protocol driver.
//!
//! - `protocol`: message encoding/decoding
//! - `connection`: startup, authentication, simple and extended queries
//! - `types`: value encoding/decoding per type OID
//! - `statement`: per-connection prepared statement cache
//! - `connector`: pool integration

pub mod connection;
pub mod connector;
pub mod error;
pub mod protocol;
pub mod scram;
pub mod statement;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{PgConfig, PgConnection, QueryResult};
pub use connector::PgConnector;
pub use error::{PgError, PgResult};
pub use statement::{PreparedStatement, SharedColumns};
pub use types::{Oid, PgValue};
