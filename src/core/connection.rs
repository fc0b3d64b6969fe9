//! The connection trait
//!
//! One live session per connection, at most one active transaction, one
//! in-flight statement at a time. Backends implement the lifecycle, raw
//! execution, and transaction methods; the condition-based helpers and the
//! scoped `transaction` block are provided on top of them.

use super::cursor::RowCursor;
use super::error::Result;
use super::row::Row;
use super::statement::{
    DeleteStatement, Dialect, InsertStatement, SelectStatement, UpdateStatement,
};
use super::value::Value;
use async_trait::async_trait;
use tracing::trace;

/// Core connection trait implemented by every backend
#[async_trait]
pub trait Connection: Send + Sync {
    /// Placeholder dialect of the backing engine
    fn dialect(&self) -> Dialect;

    /// Open a session using the engine's own connection-string format.
    /// Reconnecting an already-open connection replaces the session and
    /// clears any tracked transaction.
    async fn connect(&self, url: &str) -> Result<()>;

    /// Check whether a session is open
    fn is_connected(&self) -> bool;

    /// Release the session; subsequent operations fail with `NotConnected`
    async fn disconnect(&self) -> Result<()>;

    /// Run arbitrary SQL with positional parameters, returning the number of
    /// affected rows. No result-row normalization.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute and return the first row, or `None` for an empty result set
    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>>;

    /// Execute and return all rows in engine order
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute and return a lazy, single-pass row cursor. The cursor holds
    /// the connection until it is exhausted, closed, or dropped; issue no
    /// other statement on this connection before that.
    async fn fetch_iter(&self, sql: &str, params: &[Value]) -> Result<RowCursor>;

    /// Open a transaction if none is active; no-op otherwise
    async fn begin(&self) -> Result<()>;

    /// Commit and clear the active transaction; no-op when none is active
    async fn commit(&self) -> Result<()>;

    /// Roll back and clear the active transaction; no-op when none is active
    async fn rollback(&self) -> Result<()>;

    /// Check whether a transaction is currently active
    fn in_transaction(&self) -> bool;

    /// `SELECT * FROM table` filtered by ANDed equality conditions,
    /// returning the first row or `None`
    async fn find_one(&self, table: &str, conditions: &[(&str, Value)]) -> Result<Option<Row>> {
        let mut stmt = SelectStatement::new(table);
        for (column, value) in conditions {
            stmt = stmt.where_eq(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "find_one");
        self.fetch_one(&sql, &stmt.params()).await
    }

    /// Same statement as `find_one`, returning all matching rows
    async fn find_all(&self, table: &str, conditions: &[(&str, Value)]) -> Result<Vec<Row>> {
        let mut stmt = SelectStatement::new(table);
        for (column, value) in conditions {
            stmt = stmt.where_eq(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "find_all");
        self.fetch_all(&sql, &stmt.params()).await
    }

    /// Same statement as `find_one`, returning a lazy row cursor
    async fn find_iter(&self, table: &str, conditions: &[(&str, Value)]) -> Result<RowCursor> {
        let mut stmt = SelectStatement::new(table);
        for (column, value) in conditions {
            stmt = stmt.where_eq(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "find_iter");
        self.fetch_iter(&sql, &stmt.params()).await
    }

    /// Insert one record, returning the inserted row (via `RETURNING *`)
    async fn insert(&self, table: &str, data: &[(&str, Value)]) -> Result<Option<Row>> {
        let mut stmt = InsertStatement::new(table);
        for (column, value) in data {
            stmt = stmt.value(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "insert");
        self.fetch_one(&sql, &stmt.params()).await
    }

    /// Update matching records, returning the first updated row. When the
    /// conditions match several rows, all are updated but only the first row
    /// the engine returns comes back.
    async fn update(
        &self,
        table: &str,
        data: &[(&str, Value)],
        conditions: &[(&str, Value)],
    ) -> Result<Option<Row>> {
        let mut stmt = UpdateStatement::new(table);
        for (column, value) in data {
            stmt = stmt.set(column, value.clone());
        }
        for (column, value) in conditions {
            stmt = stmt.where_eq(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "update");
        self.fetch_one(&sql, &stmt.params()).await
    }

    /// Delete matching records, returning the first deleted row
    async fn delete(&self, table: &str, conditions: &[(&str, Value)]) -> Result<Option<Row>> {
        let mut stmt = DeleteStatement::new(table);
        for (column, value) in conditions {
            stmt = stmt.where_eq(column, value.clone());
        }
        let sql = stmt.build(self.dialect());
        trace!(sql = %sql, "delete");
        self.fetch_one(&sql, &stmt.params()).await
    }

    /// Scoped transaction: begin, run the caller's block, commit on normal
    /// exit, roll back on error. Uses the same tracked transaction state as
    /// `begin`/`commit`/`rollback`, so inside a manually opened transaction
    /// the block joins it and a normal exit commits it.
    async fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: for<'a> FnOnce(
                &'a Self,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<T>> + Send + 'a>,
            > + Send,
        T: Send,
        Self: Sized,
    {
        self.begin().await?;

        match f(self).await {
            Ok(result) => {
                self.commit().await?;
                Ok(result)
            }
            Err(e) => {
                let _ = self.rollback().await;
                Err(e)
            }
        }
    }
}
