//! Error types for the connection layer
//!
//! Engine errors propagate unchanged; the only error this crate introduces
//! itself is `NotConnected`.

/// Result type alias for connection operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for connection operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection has been closed (or was never opened)
    #[error("connection is not open")]
    NotConnected,

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL error
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_display() {
        assert_eq!(Error::NotConnected.to_string(), "connection is not open");
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("something went sideways");
        assert!(matches!(err, Error::Other(_)));
        assert_eq!(err.to_string(), "something went sideways");
    }
}
