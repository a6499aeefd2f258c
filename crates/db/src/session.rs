use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use sea_orm::{
    DatabaseConnection, DatabaseTransaction, DbErr, SqliteTransactionMode, TransactionOptions,
    TransactionTrait,
};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::models::todo::{Todo, TodoError};

/// How a session's transactions are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Deferred transactions that take no lock until the first statement.
    Read,
    /// Transactions that claim the write lock at `BEGIN`, so a concurrent
    /// writer makes this one wait on the busy timeout instead of failing a
    /// read-to-write lock upgrade.
    Write,
}

impl SessionMode {
    fn transaction_options(self) -> TransactionOptions {
        let sqlite_mode = match self {
            SessionMode::Read => SqliteTransactionMode::Deferred,
            SessionMode::Write => SqliteTransactionMode::Immediate,
        };
        TransactionOptions {
            sqlite_transaction_mode: Some(sqlite_mode),
            ..Default::default()
        }
    }
}

/// Request-scoped unit of work.
///
/// Clones share the same underlying transaction, so every part of a request
/// sees the same session. The transaction is begun on first use; [`commit`]
/// makes pending writes durable and the next use begins a fresh one.
/// [`close`] rolls back whatever was not committed and is effective once.
///
/// [`commit`]: DbSession::commit
/// [`close`]: DbSession::close
#[derive(Clone)]
pub struct DbSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    pool: DatabaseConnection,
    mode: SessionMode,
    allow_reset: bool,
    txn: Mutex<Option<DatabaseTransaction>>,
    closed: AtomicBool,
}

impl DbSession {
    pub(crate) fn new(pool: DatabaseConnection, mode: SessionMode, allow_reset: bool) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                pool,
                mode,
                allow_reset,
                txn: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Borrows the session's transaction, beginning it if needed. Drop the
    /// guard before calling [`DbSession::commit`].
    pub async fn conn(&self) -> Result<MappedMutexGuard<'_, DatabaseTransaction>, DbErr> {
        if self.is_closed() {
            return Err(DbErr::Custom("database session is closed".to_string()));
        }
        let mut guard = self.inner.txn.lock().await;
        if guard.is_none() {
            let options = self.inner.mode.transaction_options();
            *guard = Some(self.inner.pool.begin_with_options(options).await?);
        }
        MutexGuard::try_map(guard, |txn| txn.as_mut())
            .map_err(|_| DbErr::Custom("database session has no transaction".to_string()))
    }

    pub async fn commit(&self) -> Result<(), DbErr> {
        let txn = self.inner.txn.lock().await.take();
        if let Some(txn) = txn {
            txn.commit().await?;
        }
        Ok(())
    }

    /// Releases the session, rolling back uncommitted work. Returns `false`
    /// if the session had already been closed.
    pub async fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let txn = self.inner.txn.lock().await.take();
        if let Some(txn) = txn {
            if let Err(err) = txn.rollback().await {
                tracing::warn!("Failed to roll back database session: {}", err);
            }
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Deletes every todo and commits. Only available when the service was
    /// started with resets enabled.
    pub async fn delete_all_todos(&self) -> Result<u64, TodoError> {
        if !self.inner.allow_reset {
            return Err(TodoError::Forbidden);
        }
        let removed = {
            let conn = self.conn().await?;
            Todo::delete_all(&*conn).await?
        };
        self.commit().await?;
        tracing::info!(removed, "Reset todos");
        Ok(removed)
    }
}
