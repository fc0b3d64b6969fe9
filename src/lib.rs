//! # rowbox
//!
//! A thin, stay-out-of-your-way convenience layer over a SQL database
//! connection. It opens a connection, runs transactions, and offers small
//! helpers that build simple SELECT/INSERT/UPDATE/DELETE statements from a
//! table name and a set of column equality conditions. Everything else is a
//! pass-through to the underlying engine client.
//!
//! ## Features
//!
//! - **One connection, one statement**: a single live session, operations
//!   serialize; no pooling, no query planning, no retry logic
//! - **Normalized rows**: every fetched record becomes an ordered
//!   column -> value mapping
//! - **Lazy iteration**: `fetch_iter`/`find_iter` stream rows one at a time
//!   through an explicit cursor instead of buffering the result set
//! - **Manual and scoped transactions**: idempotent `begin`, no-op
//!   `commit`/`rollback` when nothing is open, or a closure-scoped
//!   `transaction` that commits on success and rolls back on error
//! - **Multiple engines**: SQLite (default) and PostgreSQL, selected by
//!   cargo features
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! rowbox = { version = "0.1", features = ["sqlite"] }
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ```rust,no_run
//! use rowbox::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let db = SqliteConnection::new();
//!     db.connect(":memory:").await?;
//!
//!     db.execute(
//!         "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT, role TEXT)",
//!         &[],
//!     )
//!     .await?;
//!
//!     // Helpers build the statement and hand back normalized rows
//!     db.insert(
//!         "users",
//!         &[("username", "mal".into()), ("role", "Captain".into())],
//!     )
//!     .await?;
//!
//!     if let Some(row) = db.find_one("users", &[("username", "mal".into())]).await? {
//!         println!("role: {}", row.get("role").map(|v| v.as_string()).unwrap_or_default());
//!     }
//!
//!     // Anything richer than ANDed equality goes through the raw calls
//!     let rows = db
//!         .fetch_all("SELECT * FROM users WHERE id > ?", &[1i64.into()])
//!         .await?;
//!     println!("{} rows", rows.len());
//!
//!     db.disconnect().await?;
//!     Ok(())
//! }
//! ```

/// Core connection-layer types and traits
pub mod core;

/// Engine backend implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rowbox::prelude::*;
///
/// let stmt = SelectStatement::new("users").where_eq("id", 1);
/// assert_eq!(stmt.build(Dialect::Sqlite), "SELECT * FROM users WHERE id = ?");
/// ```
pub mod prelude {
    pub use crate::core::{
        Connection, DeleteStatement, Dialect, Error, InsertStatement, Result, Row, RowCursor,
        SelectStatement, UpdateStatement, Value,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteConnection;

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresConnection;
}

// Re-export at root level for convenience
pub use crate::core::{
    Connection, DeleteStatement, Dialect, Error, InsertStatement, Result, Row, RowCursor,
    SelectStatement, UpdateStatement, Value,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteConnection;

#[cfg(feature = "postgres")]
pub use backends::PostgresConnection;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let stmt = SelectStatement::new("users").where_eq("id", 1);
        assert_eq!(
            stmt.build(Dialect::Sqlite),
            "SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_value_conversions() {
        let val: Value = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: Value = "test".into();
        assert_eq!(val.as_string(), "test");

        let val: Value = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }
}
