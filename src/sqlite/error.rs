//! SQLite error types.

pub type SqliteResult<T> = Result<T, SqliteError>;

#[derive(Debug)]
pub enum SqliteError {
    /// Error reported by SQLite itself
    Sqlite(rusqlite::Error),
    /// The background connection thread failed
    Runtime(String),
    /// Type conversion error
    Type(String),
    ConnectionClosed,
}

impl SqliteError {
    /// Extended result code of a SQLite failure (e.g. 2067 for a UNIQUE violation).
    pub fn extended_code(&self) -> Option<i32> {
        match self {
            SqliteError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => Some(e.extended_code),
            _ => None,
        }
    }
}

impl std::fmt::Display for SqliteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqliteError::Sqlite(e) => write!(f, "SQLite error: {}", e),
            SqliteError::Runtime(e) => write!(f, "Connection thread error: {}", e),
            SqliteError::Type(e) => write!(f, "Type error: {}", e),
            SqliteError::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SqliteError::Sqlite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(e: rusqlite::Error) -> Self {
        SqliteError::Sqlite(e)
    }
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        match e {
            tokio_rusqlite::Error::Rusqlite(e) => SqliteError::Sqlite(e),
            tokio_rusqlite::Error::ConnectionClosed => SqliteError::ConnectionClosed,
            other => SqliteError::Runtime(other.to_string()),
        }
    }
}
