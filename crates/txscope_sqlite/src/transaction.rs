//! SQLite transaction handle.

use crate::pool::PooledConnection;
use crate::statement;
use parking_lot::Mutex;
use txscope_driver::{
    codes, CommandTag, Context, DriverError, DriverResult, Queryer, Row, Rows, Transaction, Value,
};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Transaction is open and accepts statements.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

struct Inner {
    conn: PooledConnection,
    state: TxState,
    /// A statement lost a lock conflict; the read snapshot may be stale.
    conflicted: bool,
}

impl Inner {
    fn ensure_active(&self) -> DriverResult<()> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Committed | TxState::RolledBack => Err(DriverError::TxClosed),
        }
    }

    fn observe<T>(&mut self, result: DriverResult<T>) -> DriverResult<T> {
        if let Err(e) = &result {
            if e.as_db_error().is_some_and(|db| codes::is_retryable(&db.code)) {
                self.conflicted = true;
            }
        }
        result
    }
}

/// A transaction on one pooled SQLite connection.
///
/// The connection goes back to the pool when the handle is dropped; if the
/// transaction is still active at that point it is rolled back.
pub struct SqliteTx {
    id: u64,
    inner: Mutex<Inner>,
}

impl SqliteTx {
    pub(crate) fn new(id: u64, conn: PooledConnection) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                conn,
                state: TxState::Active,
                conflicted: false,
            }),
        }
    }

    /// Returns the pool-unique transaction ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxState {
        self.inner.lock().state
    }
}

impl std::fmt::Debug for SqliteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTx")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Queryer for SqliteTx {
    fn query(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Rows> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        let result = statement::query(&inner.conn, cx, timeout, sql, args);
        inner.observe(result)
    }

    fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Row> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        let result = statement::query_row(&inner.conn, cx, timeout, sql, args);
        inner.observe(result)
    }

    fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<CommandTag> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        let result = statement::exec(&inner.conn, cx, timeout, sql, args);
        inner.observe(result)
    }
}

impl Transaction for SqliteTx {
    fn commit(&self, cx: &Context) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        match statement::control(&inner.conn, cx, timeout, "COMMIT") {
            Ok(()) => {
                inner.state = TxState::Committed;
                tracing::debug!(tx_id = self.id, "committed sqlite transaction");
                Ok(())
            }
            Err(e) => {
                // SQLite may already have rolled back on its own.
                if inner.conn.is_autocommit() {
                    inner.state = TxState::RolledBack;
                }
                Err(e)
            }
        }
    }

    fn rollback(&self, cx: &Context) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        // Rollback must still run after cancellation, so only the lock wait
        // is bounded by the caller's context.
        let cleanup = Context::background();
        let cleanup = match cx.remaining() {
            Some(remaining) if !remaining.is_zero() => cleanup.with_timeout(remaining),
            _ => cleanup,
        };
        let result = statement::control(&inner.conn, &cleanup, timeout, "ROLLBACK");
        if result.is_ok() || inner.conn.is_autocommit() {
            inner.state = TxState::RolledBack;
            tracing::debug!(tx_id = self.id, "rolled back sqlite transaction");
        }
        result
    }

    /// Rewinds to `savepoint`.
    ///
    /// After a lock conflict the transaction's WAL snapshot is out of date,
    /// and `ROLLBACK TO` keeps that snapshot, so every replay would hit the
    /// same conflict. In that case the transaction is rolled back and begun
    /// again on the same connection with the savepoint retaken.
    fn rollback_to_savepoint(&self, cx: &Context, savepoint: &str) -> DriverResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        let timeout = inner.conn.config().busy_timeout;
        let begin = inner.conn.config().begin_mode;

        if !inner.conflicted {
            let sql = format!("ROLLBACK TO SAVEPOINT {savepoint}");
            let result = statement::control(&inner.conn, cx, timeout, &sql);
            return inner.observe(result);
        }

        let sql = format!("ROLLBACK; {}; SAVEPOINT {savepoint}", begin.sql());
        match statement::control(&inner.conn, cx, timeout, &sql) {
            Ok(()) => {
                inner.conflicted = false;
                tracing::debug!(tx_id = self.id, "restarted sqlite transaction");
                Ok(())
            }
            Err(e) => {
                if inner.conn.is_autocommit() {
                    inner.state = TxState::RolledBack;
                }
                Err(e)
            }
        }
    }
}
