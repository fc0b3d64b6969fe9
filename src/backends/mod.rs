//! Engine backend implementations
//!
//! Each backend implements the core `Connection` trait for one database
//! engine, selected via cargo features.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;

#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
