//! Lazy row cursor
//!
//! `RowCursor` is the single-pass, forward-only result of `fetch_iter`. Rows
//! are pulled one at a time from a backend task that holds the live engine
//! cursor; the task keeps the connection busy until the cursor is exhausted,
//! closed, or dropped.

use super::error::Result;
use super::row::Row;
use tokio::sync::mpsc::Receiver;

enum State {
    /// Rows may still arrive from the backend task
    Open(Receiver<Result<Row>>),
    /// The underlying result set ran out
    Exhausted,
    /// Closed early via `close()` or after a mid-stream error
    Closed,
}

/// Lazy, single-pass sequence of rows
pub struct RowCursor {
    state: State,
}

impl RowCursor {
    pub(crate) fn new(rx: Receiver<Result<Row>>) -> Self {
        Self {
            state: State::Open(rx),
        }
    }

    /// Pull the next row. Returns `Ok(None)` once the result set is finished
    /// (and on every call thereafter); a mid-stream engine error closes the
    /// cursor and is returned once.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        let received = match &mut self.state {
            State::Open(rx) => rx.recv().await,
            State::Exhausted | State::Closed => return Ok(None),
        };

        match received {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => {
                self.state = State::Closed;
                Err(e)
            }
            None => {
                self.state = State::Exhausted;
                Ok(None)
            }
        }
    }

    /// Release the live engine cursor without draining the remaining rows
    pub fn close(&mut self) {
        if matches!(self.state, State::Open(_)) {
            self.state = State::Closed;
        }
    }

    /// True once the result set ran out naturally
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, State::Exhausted)
    }

    /// True after `close()` or a mid-stream error
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Drain all remaining rows into a vector, consuming the cursor
    pub async fn collect_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Open(_) => "open",
            State::Exhausted => "exhausted",
            State::Closed => "closed",
        };
        f.debug_struct("RowCursor").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::value::Value;
    use tokio::sync::mpsc;

    fn sample_row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id", Value::Long(id));
        row
    }

    #[tokio::test]
    async fn test_cursor_yields_rows_then_exhausts() {
        let (tx, rx) = mpsc::channel(1);
        let mut cursor = RowCursor::new(rx);

        tokio::spawn(async move {
            for id in 1..=3 {
                tx.send(Ok(sample_row(id))).await.unwrap();
            }
        });

        for id in 1..=3 {
            let row = cursor.next_row().await.unwrap().unwrap();
            assert_eq!(row.get("id"), Some(&Value::Long(id)));
        }
        assert_eq!(cursor.next_row().await.unwrap(), None);
        assert!(cursor.is_exhausted());
        // Stays exhausted on repeated polls
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cursor_empty_result() {
        let (tx, rx) = mpsc::channel::<Result<Row>>(1);
        drop(tx);

        let mut cursor = RowCursor::new(rx);
        assert_eq!(cursor.next_row().await.unwrap(), None);
        assert!(cursor.is_exhausted());
        assert!(!cursor.is_closed());
    }

    #[tokio::test]
    async fn test_cursor_close_stops_iteration() {
        let (tx, rx) = mpsc::channel(1);
        let mut cursor = RowCursor::new(rx);

        tx.send(Ok(sample_row(1))).await.unwrap();
        cursor.close();

        assert!(cursor.is_closed());
        assert_eq!(cursor.next_row().await.unwrap(), None);
        // The producer side sees the channel as closed
        assert!(tx.send(Ok(sample_row(2))).await.is_err());
    }

    #[tokio::test]
    async fn test_cursor_error_closes() {
        let (tx, rx) = mpsc::channel(2);
        let mut cursor = RowCursor::new(rx);

        tx.send(Ok(sample_row(1))).await.unwrap();
        tx.send(Err(Error::other("cursor went away"))).await.unwrap();

        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(cursor.next_row().await.is_err());
        assert!(cursor.is_closed());
        assert_eq!(cursor.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_collect_rows() {
        let (tx, rx) = mpsc::channel(1);
        let cursor = RowCursor::new(rx);

        tokio::spawn(async move {
            for id in 1..=5 {
                tx.send(Ok(sample_row(id))).await.unwrap();
            }
        });

        let rows = cursor.collect_rows().await.unwrap();
        assert_eq!(rows.len(), 5);
    }
}
