//! Core connection-layer types
//!
//! This module provides the connection trait, scalar values, normalized
//! rows, the lazy row cursor, statement generation, and error types.

pub mod connection;
pub mod cursor;
pub mod error;
pub mod row;
pub mod statement;
pub mod value;

// Re-export commonly used types
pub use connection::Connection;
pub use cursor::RowCursor;
pub use error::{Error, Result};
pub use row::Row;
pub use statement::{DeleteStatement, Dialect, InsertStatement, SelectStatement, UpdateStatement};
pub use value::Value;
