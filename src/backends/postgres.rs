//! PostgreSQL backend
//!
//! Implements the `Connection` trait over `tokio-postgres`. The client lives
//! behind a mutex, so statements on one connection serialize; `fetch_iter`
//! streams rows with `query_raw` instead of buffering the result set.

use crate::core::{
    connection::Connection, cursor::RowCursor, error::Error, error::Result, row::Row,
    statement::Dialect, value::Value,
};
use async_trait::async_trait;
use futures_util::{pin_mut, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::{debug, warn};

/// PostgreSQL connection
pub struct PostgresConnection {
    client: Arc<Mutex<Option<tokio_postgres::Client>>>,
    in_transaction: Arc<Mutex<bool>>,
}

impl PostgresConnection {
    /// Create a new, unconnected instance
    pub fn new() -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
        }
    }

    /// Normalize a tokio-postgres row, preserving engine column order
    fn row_to_row(row: &tokio_postgres::Row) -> Row {
        let mut out = Row::new();

        for (idx, column) in row.columns().iter().enumerate() {
            let column_name = column.name().to_string();
            let value = match column.type_().name() {
                "bool" => row
                    .get::<_, Option<bool>>(idx)
                    .map(Value::Bool)
                    .unwrap_or(Value::Null),
                "int2" | "int4" => row
                    .get::<_, Option<i32>>(idx)
                    .map(Value::Int)
                    .unwrap_or(Value::Null),
                "int8" => row
                    .get::<_, Option<i64>>(idx)
                    .map(Value::Long)
                    .unwrap_or(Value::Null),
                "float4" => row
                    .get::<_, Option<f32>>(idx)
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
                "float8" => row
                    .get::<_, Option<f64>>(idx)
                    .map(Value::Double)
                    .unwrap_or(Value::Null),
                "text" | "varchar" | "char" | "bpchar" => row
                    .get::<_, Option<String>>(idx)
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                "bytea" => row
                    .get::<_, Option<Vec<u8>>>(idx)
                    .map(Value::Bytes)
                    .unwrap_or(Value::Null),
                _ => row
                    .try_get::<_, Option<String>>(idx)
                    .ok()
                    .flatten()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            };
            out.insert(column_name, value);
        }

        out
    }

    /// Convert a Value to a postgres parameter
    fn value_to_param(value: &Value) -> Box<dyn ToSql + Sync + Send> {
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
}

impl Default for PostgresConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self, url: &str) -> Result<()> {
        debug!("opening postgres session");

        // Drop any existing session and stale transaction state first
        {
            let mut client = self.client.lock().await;
            *client = None;
        }
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;

        // The connection object drives the socket; it resolves when the
        // client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection task ended with error");
            }
        });

        let mut guard = self.client.lock().await;
        *guard = Some(client);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|client| match client.as_ref() {
                Some(client) => !client.is_closed(),
                None => false,
            })
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        debug!("closing postgres session");

        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let mut client = self.client.lock().await;
        *client = None;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;

        let params: Vec<Box<dyn ToSql + Sync + Send>> =
            params.iter().map(Self::value_to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let affected = client.execute(sql, &refs).await?;
        Ok(affected)
    }

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;

        let params: Vec<Box<dyn ToSql + Sync + Send>> =
            params.iter().map(Self::value_to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = client.query(sql, &refs).await?;
        Ok(rows.first().map(Self::row_to_row))
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;

        let params: Vec<Box<dyn ToSql + Sync + Send>> =
            params.iter().map(Self::value_to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = client.query(sql, &refs).await?;
        Ok(rows.iter().map(Self::row_to_row).collect())
    }

    async fn fetch_iter(&self, sql: &str, params: &[Value]) -> Result<RowCursor> {
        let sql = sql.to_string();
        let params = params.to_vec();
        let client = Arc::clone(&self.client);
        let (tx, rx) = mpsc::channel(1);

        // The producer holds the client lock until the cursor is exhausted
        // or the receiver goes away, so the connection stays busy for the
        // cursor's whole lifetime.
        tokio::spawn(async move {
            let guard = client.lock().await;
            let client = match guard.as_ref() {
                Some(client) => client,
                None => {
                    let _ = tx.send(Err(Error::NotConnected)).await;
                    return;
                }
            };

            let params: Vec<Box<dyn ToSql + Sync + Send>> =
                params.iter().map(Self::value_to_param).collect();
            let stream = match client
                .query_raw(
                    sql.as_str(),
                    params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)),
                )
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    return;
                }
            };
            pin_mut!(stream);

            while let Some(item) = stream.next().await {
                match item {
                    Ok(row) => {
                        if tx.send(Ok(Self::row_to_row(&row))).await.is_err() {
                            // Cursor was closed or dropped early
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                }
            }
        });

        Ok(RowCursor::new(rx))
    }

    async fn begin(&self) -> Result<()> {
        let mut in_transaction = self.in_transaction.lock().await;
        if *in_transaction {
            return Ok(());
        }

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;
        client.batch_execute("BEGIN").await?;
        *in_transaction = true;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut in_transaction = self.in_transaction.lock().await;
        if !*in_transaction {
            return Ok(());
        }

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;
        client.batch_execute("COMMIT").await?;
        *in_transaction = false;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut in_transaction = self.in_transaction.lock().await;
        if !*in_transaction {
            return Ok(());
        }

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(Error::NotConnected)?;
        client.batch_execute("ROLLBACK").await?;
        *in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Connected tests require a running PostgreSQL instance; set PG_URL and
    // run with: cargo test --features postgres -- --ignored

    fn postgres_url() -> Option<String> {
        std::env::var("PG_URL").ok()
    }

    #[tokio::test]
    async fn test_not_connected_error() {
        let db = PostgresConnection::new();
        assert!(!db.is_connected());
        let err = db.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    #[ignore]
    async fn test_postgres_roundtrip() {
        let url = match postgres_url() {
            Some(url) => url,
            None => return,
        };

        let db = PostgresConnection::new();
        db.connect(&url).await.expect("connect failed");
        assert!(db.is_connected());

        db.execute("CREATE TEMPORARY TABLE t (id serial PRIMARY KEY, name text)", &[])
            .await
            .expect("create failed");

        let inserted = db
            .insert("t", &[("name", Value::from("mal"))])
            .await
            .expect("insert failed")
            .expect("row expected");
        assert_eq!(inserted.get("name").and_then(Value::as_str), Some("mal"));

        let found = db
            .find_one("t", &[("name", Value::from("mal"))])
            .await
            .expect("find failed");
        assert_eq!(found, Some(inserted));
    }
}
