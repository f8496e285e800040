//! Error types for dbkit.
//!
//! Driver-level failures keep their own types (`PgError`, `SqliteError`) and
//! are wrapped unmodified so callers can still match on server error codes.

use std::time::Duration;

use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};
use crate::pg::PgError;
use crate::sqlite::SqliteError;

#[derive(Error, Debug)]
pub enum DbError {
    /// The driver named in the pool configuration is not available.
    #[error("database driver not found: {driver}")]
    DriverLoad { driver: String },

    /// The pool could not open its first connection in time.
    #[error("pool initialization failed after {elapsed:?}: {source}")]
    PoolInit {
        elapsed: Duration,
        #[source]
        source: Box<DbError>,
    },

    /// No connection could be checked out within the acquisition timeout.
    #[error("connection acquisition timed out after {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    /// A bounded readiness wait gave up.
    #[error("database not ready after {attempts} attempts")]
    NotReady { attempts: u32 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid statement: {0}")]
    StatementError(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("postgres: {0}")]
    Postgres(#[from] PgError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] SqliteError),
}

impl DbError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::AcquisitionTimeout(_) => true,
            DbError::Postgres(e) => e.is_connection_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
