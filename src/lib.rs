//! dbkit - connection pool lifecycle and column codecs for PostgreSQL and SQLite.
//!
//! No external database client crates: PostgreSQL is spoken natively over the
//! v3 wire protocol, SQLite runs embedded through rusqlite.
//!
//! ```no_run
//! use dbkit::{PoolConfig, PoolManager};
//!
//! # async fn run() -> dbkit::Result<()> {
//! let manager = PoolManager::new(PoolConfig::new("postgresql", "postgres://app@db/app")).await?;
//! manager.await_ready().await;
//!
//! let source = manager.data_source();
//! source.execute("UPDATE jobs SET state = 'queued'", &[]).await?;
//!
//! manager.close().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod pg;
pub mod pool;
pub mod sql;
pub mod sqlite;
pub mod value;

pub use config::{Driver, PoolConfig};
pub use error::{DbError, Result};
pub use executor::{Connection, DataSource, QueryResult, Row};
pub use manager::PoolManager;
pub use pool::PoolStatus;
pub use value::{TaggedValue, Value};
