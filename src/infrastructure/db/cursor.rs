use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::ports::cursor::Cursor;
use crate::domain::{Error, Result};
use crate::infrastructure::db::PgPool;

pub type PgQuery = Query<'static, Postgres, PgArguments>;
pub type RowDecoder<T> = fn(&PgRow) -> sqlx::Result<T>;

/// Lazily decoded result set.
///
/// A background task owns the streaming query and hands decoded rows over a
/// channel of capacity one, so at most one row is materialised ahead of the
/// consumer. Closing or dropping the cursor aborts the query.
pub struct RowCursor<T> {
    rx: mpsc::Receiver<Result<T>>,
    task: Option<JoinHandle<()>>,
    current: Option<T>,
    last_err: Option<Error>,
    done: bool,
}

impl<T: Send + 'static> RowCursor<T> {
    pub fn spawn(op: &'static str, pool: PgPool, query: PgQuery, decode: RowDecoder<T>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut rows = query.fetch(&pool);
            loop {
                let item = match rows.try_next().await {
                    Ok(Some(row)) => decode(&row).map_err(|e| Error::new(op, e.into())),
                    Ok(None) => break,
                    Err(e) => Err(Error::new(op, e.into())),
                };
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        Self {
            rx,
            task: Some(task),
            current: None,
            last_err: None,
            done: false,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Cursor for RowCursor<T> {
    type Item = T;

    async fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        match self.rx.recv().await {
            Some(Ok(item)) => {
                self.current = Some(item);
                true
            }
            Some(Err(err)) => {
                tracing::debug!(error = %err, "row_cursor_failed");
                self.last_err = Some(err);
                self.current = None;
                self.done = true;
                false
            }
            None => {
                self.current = None;
                self.done = true;
                false
            }
        }
    }

    fn error(&self) -> Option<&Error> {
        self.last_err.as_ref()
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.done = true;
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

impl<T> Drop for RowCursor<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
