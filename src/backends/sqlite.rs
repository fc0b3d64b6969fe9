//! SQLite backend
//!
//! Implements the `Connection` trait over `rusqlite`. All engine work runs
//! on the blocking thread pool; the session handle lives behind a mutex, so
//! statements on one connection serialize.

use crate::core::{
    connection::Connection, cursor::RowCursor, error::Error, error::Result, row::Row,
    statement::Dialect, value::Value,
};
use async_trait::async_trait;
use rusqlite::params_from_iter;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// SQLite connection
pub struct SqliteConnection {
    conn: Arc<Mutex<Option<rusqlite::Connection>>>,
    in_transaction: Arc<Mutex<bool>>,
}

impl SqliteConnection {
    /// Create a new, unconnected instance
    pub fn new() -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
        }
    }

    /// Normalize a rusqlite row, preserving engine column order
    fn row_to_row(row: &rusqlite::Row) -> rusqlite::Result<Row> {
        let mut out = Row::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(v) => Value::Long(v),
                rusqlite::types::ValueRef::Real(v) => Value::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    Value::String(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
            };
            out.insert(column_name, value);
        }

        Ok(out)
    }

    /// Convert a Value to a rusqlite parameter
    fn value_to_param(value: &Value) -> Box<dyn rusqlite::ToSql> {
        match value {
            Value::Null => Box::new(None::<i64>),
            Value::Bool(v) => Box::new(*v),
            Value::Int(v) => Box::new(*v),
            Value::Long(v) => Box::new(*v),
            Value::Float(v) => Box::new(*v),
            Value::Double(v) => Box::new(*v),
            Value::String(v) => Box::new(v.clone()),
            Value::Bytes(v) => Box::new(v.clone()),
        }
    }

    /// Run a closure against the live session on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T> {
            let guard = conn.blocking_lock();
            let conn = guard.as_ref().ok_or(Error::NotConnected)?;
            f(conn)
        })
        .await
        .map_err(|e| Error::other(format!("task join error: {e}")))?
    }
}

impl Default for SqliteConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self, url: &str) -> Result<()> {
        debug!(url, "opening sqlite session");

        // Drop any existing session and stale transaction state first
        {
            let mut conn = self.conn.lock().await;
            *conn = None;
        }
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let url = url.to_string();
        let conn_arc = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = rusqlite::Connection::open(&url)?;
            conn.execute("PRAGMA foreign_keys = ON", [])?;

            let mut guard = conn_arc.blocking_lock();
            *guard = Some(conn);
            Ok(())
        })
        .await
        .map_err(|e| Error::other(format!("task join error: {e}")))??;

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        debug!("closing sqlite session");

        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let mut conn = self.conn.lock().await;
        *conn = None;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.with_conn(move |conn| {
            let params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();
            let mut stmt = conn.prepare(&sql)?;
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.with_conn(move |conn| {
            let params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();

        self.with_conn(move |conn| {
            let params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(params.iter()), Self::row_to_row)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    async fn fetch_iter(&self, sql: &str, params: &[Value]) -> Result<RowCursor> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let conn = Arc::clone(&self.conn);
        let (tx, rx) = mpsc::channel(1);

        // The producer holds the session lock until the cursor is exhausted
        // or the receiver goes away, so the connection stays busy for the
        // cursor's whole lifetime.
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            let conn = match guard.as_ref() {
                Some(conn) => conn,
                None => {
                    let _ = tx.blocking_send(Err(Error::NotConnected));
                    return;
                }
            };

            let params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();
            let mut stmt = match conn.prepare(&sql) {
                Ok(stmt) => stmt,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e.into()));
                    return;
                }
            };
            let mut rows = match stmt.query(params_from_iter(params.iter())) {
                Ok(rows) => rows,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e.into()));
                    return;
                }
            };

            loop {
                match rows.next() {
                    Ok(Some(row)) => {
                        let row = match Self::row_to_row(row) {
                            Ok(row) => row,
                            Err(e) => {
                                let _ = tx.blocking_send(Err(e.into()));
                                return;
                            }
                        };
                        if tx.blocking_send(Ok(row)).is_err() {
                            // Cursor was closed or dropped early
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e.into()));
                        return;
                    }
                }
            }
        });

        Ok(RowCursor::new(rx))
    }

    async fn begin(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let in_transaction = Arc::clone(&self.in_transaction);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut in_transaction = in_transaction.blocking_lock();
            if *in_transaction {
                return Ok(());
            }

            let guard = conn.blocking_lock();
            let conn = guard.as_ref().ok_or(Error::NotConnected)?;
            conn.execute_batch("BEGIN TRANSACTION")?;
            *in_transaction = true;
            Ok(())
        })
        .await
        .map_err(|e| Error::other(format!("task join error: {e}")))?
    }

    async fn commit(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let in_transaction = Arc::clone(&self.in_transaction);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut in_transaction = in_transaction.blocking_lock();
            if !*in_transaction {
                return Ok(());
            }

            let guard = conn.blocking_lock();
            let conn = guard.as_ref().ok_or(Error::NotConnected)?;
            conn.execute_batch("COMMIT")?;
            *in_transaction = false;
            Ok(())
        })
        .await
        .map_err(|e| Error::other(format!("task join error: {e}")))?
    }

    async fn rollback(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let in_transaction = Arc::clone(&self.in_transaction);

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut in_transaction = in_transaction.blocking_lock();
            if !*in_transaction {
                return Ok(());
            }

            let guard = conn.blocking_lock();
            let conn = guard.as_ref().ok_or(Error::NotConnected)?;
            conn.execute_batch("ROLLBACK")?;
            *in_transaction = false;
            Ok(())
        })
        .await
        .map_err(|e| Error::other(format!("task join error: {e}")))?
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        // Best-effort rollback of an abandoned transaction; Drop cannot be async
        if let Ok(in_transaction) = self.in_transaction.try_lock() {
            if *in_transaction {
                warn!("sqlite connection dropped with an open transaction, rolling back");
                if let Ok(conn) = self.conn.try_lock() {
                    if let Some(conn) = conn.as_ref() {
                        let _ = conn.execute_batch("ROLLBACK");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_disconnect() {
        let db = SqliteConnection::new();
        assert!(!db.is_connected());
        assert!(db.connect(":memory:").await.is_ok());
        assert!(db.is_connected());
        assert!(db.disconnect().await.is_ok());
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_execute_affected_rows() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await?;

        let affected = db
            .execute(
                "INSERT INTO test (name) VALUES (?)",
                &[Value::from("Alice")],
            )
            .await?;
        assert_eq!(affected, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_one_normalizes_row() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await?;
        db.execute("INSERT INTO test (name) VALUES ('Alice')", &[])
            .await?;

        let row = db
            .fetch_one("SELECT * FROM test", &[])
            .await?
            .expect("row expected");
        let columns: Vec<&str> = row.columns().collect();
        assert_eq!(columns, vec!["id", "name"]);
        assert_eq!(row.get("name").and_then(Value::as_str), Some("Alice"));
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_one_empty_is_none() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[])
            .await?;
        assert_eq!(db.fetch_one("SELECT * FROM test", &[]).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_null_values() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)", &[])
            .await?;
        db.execute(
            "INSERT INTO test (id, value) VALUES (?, ?)",
            &[Value::Int(1), Value::Null],
        )
        .await?;

        let row = db
            .fetch_one("SELECT value FROM test WHERE id = 1", &[])
            .await?
            .expect("row expected");
        assert!(matches!(row.get("value"), Some(Value::Null)));
        Ok(())
    }

    #[tokio::test]
    async fn test_begin_is_idempotent() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.begin().await?;
        db.begin().await?;
        assert!(db.in_transaction());

        db.rollback().await?;
        assert!(!db.in_transaction());
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_rollback_without_transaction_are_noops() -> Result<()> {
        let db = SqliteConnection::new();
        db.connect(":memory:").await?;

        db.commit().await?;
        db.rollback().await?;
        assert!(!db.in_transaction());
        Ok(())
    }

    #[tokio::test]
    async fn test_not_connected_error() {
        let db = SqliteConnection::new();
        let err = db.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_invalid_sql_propagates() {
        let db = SqliteConnection::new();
        db.connect(":memory:").await.unwrap();
        let err = db.execute("NOT VALID SQL", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Sqlite(_)));
    }
}
