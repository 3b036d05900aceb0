//! The scoped query facade.

use crate::adapter::TxAdapter;
use crate::carrier::{tx_from_context, with_tx, TxHandle};
use crate::classify::is_serialization_failure;
use crate::config::{TxConfig, TxMode};
use crate::error::{Error, Result};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use txscope_driver::{CommandTag, Context, Pool, Row, Rows, Value};
use txscope_retry::{execute_in_tx, RetryError};

/// Rolls the transaction back when the `run_tx` frame exits without
/// disarming it, including by unwinding.
struct TxGuard<'a> {
    tx: &'a TxHandle,
    cx: &'a Context,
    armed: bool,
}

impl<'a> TxGuard<'a> {
    fn new(tx: &'a TxHandle, cx: &'a Context) -> Self {
        Self {
            tx,
            cx,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.tx.rollback(self.cx) {
            Ok(()) => tracing::debug!(tx_id = self.tx.id(), "rolled back transaction"),
            // Already committed or rolled back.
            Err(e) if e.is_tx_closed() => {}
            Err(e) => tracing::warn!(
                tx_id = self.tx.id(),
                error = %e,
                "failed to roll back transaction"
            ),
        }
    }
}

/// Query entry point that follows the transaction carried by the context.
///
/// Outside [`Db::run_tx`] statements go straight to the pool. Inside it,
/// the derived context handed to the closure carries the transaction and
/// every statement issued with that context (or a child of it) runs on the
/// transaction's connection, no matter how deep in the call stack.
///
/// `Db` holds no per-call state and can be shared freely between threads.
///
/// ## Example
///
/// ```rust,no_run
/// use txscope_core::{params, Context, Db, Error};
/// use txscope_sqlite::{SqliteConfig, SqlitePool};
///
/// let db = Db::new(SqlitePool::open(SqliteConfig::new("app.db")).unwrap());
/// let cx = Context::background();
///
/// db.run_tx(&cx, |cx| {
///     db.exec(cx, "UPDATE accounts SET balance = balance - 10 WHERE id = ?1", &params![1])?;
///     db.exec(cx, "UPDATE accounts SET balance = balance + 10 WHERE id = ?1", &params![2])?;
///     Ok::<_, Error>(())
/// })
/// .unwrap();
/// ```
pub struct Db {
    pool: Arc<dyn Pool>,
    config: TxConfig,
}

impl Db {
    /// Creates a facade over `pool` with the default configuration.
    pub fn new<P: Pool + 'static>(pool: P) -> Self {
        Self::with_config(pool, TxConfig::default())
    }

    /// Creates a facade over `pool`.
    pub fn with_config<P: Pool + 'static>(pool: P, config: TxConfig) -> Self {
        Self::from_arc(Arc::new(pool), config)
    }

    /// Creates a facade over an already shared pool.
    pub fn from_arc(pool: Arc<dyn Pool>, config: TxConfig) -> Self {
        Self { pool, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TxConfig {
        &self.config
    }

    /// Returns the pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<dyn Pool> {
        &self.pool
    }

    /// Runs a query on the context's transaction, or on the pool.
    pub fn query(&self, cx: &Context, sql: &str, args: &[Value]) -> Result<Rows> {
        let rows = match tx_from_context(cx) {
            Some(tx) => tx.query(cx, sql, args)?,
            None => self.pool.query(cx, sql, args)?,
        };
        Ok(rows)
    }

    /// Runs a query and returns its first row.
    ///
    /// An empty result is [`DriverError::NoRows`](txscope_driver::DriverError::NoRows),
    /// which [`is_not_found_error`](crate::is_not_found_error) recognizes.
    pub fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> Result<Row> {
        let row = match tx_from_context(cx) {
            Some(tx) => tx.query_row(cx, sql, args)?,
            None => self.pool.query_row(cx, sql, args)?,
        };
        Ok(row)
    }

    /// Executes a statement on the context's transaction, or on the pool.
    pub fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> Result<CommandTag> {
        let tag = match tx_from_context(cx) {
            Some(tx) => tx.exec(cx, sql, args)?,
            None => self.pool.exec(cx, sql, args)?,
        };
        Ok(tag)
    }

    /// Runs `f` inside a transaction, using the configured [`TxMode`].
    ///
    /// See [`Db::run_tx_with`].
    pub fn run_tx<T, E, F>(&self, cx: &Context, f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&Context) -> std::result::Result<T, E>,
        E: StdError + From<Error> + 'static,
    {
        self.run_tx_with(cx, self.config.mode, f)
    }

    /// Runs `f` inside a transaction.
    ///
    /// If `cx` already carries a transaction, `f` simply runs in it: nested
    /// calls join the outermost transaction and only the outermost call
    /// commits. Otherwise a transaction is begun and `f` receives a context
    /// carrying it:
    ///
    /// - `f` succeeds: the transaction is committed.
    /// - `f` fails: the transaction is rolled back and `f`'s error is
    ///   returned as is.
    /// - In [`TxMode::Retrying`], `f` is replayed from the start after a
    ///   serialization failure, up to the configured attempt budget, so it
    ///   must be safe to run more than once.
    ///
    /// Failures of `run_tx` itself reach the caller through `E: From<Error>`:
    /// [`Error::Begin`] (then `f` never ran), [`Error::Commit`], and
    /// [`Error::Rollback`] when rolling back after a failed commit also
    /// failed.
    pub fn run_tx_with<T, E, F>(
        &self,
        cx: &Context,
        mode: TxMode,
        mut f: F,
    ) -> std::result::Result<T, E>
    where
        F: FnMut(&Context) -> std::result::Result<T, E>,
        E: StdError + From<Error> + 'static,
    {
        if tx_from_context(cx).is_some() {
            return f(cx);
        }

        let tx = TxHandle::new(self.pool.begin(cx).map_err(Error::Begin)?);
        tracing::debug!(tx_id = tx.id(), ?mode, "began transaction");
        let mut guard = TxGuard::new(&tx, cx);
        let tx_cx = with_tx(cx, tx.clone());

        let value = match mode {
            TxMode::Plain => f(&tx_cx)?,
            TxMode::Retrying => self.retry(&tx_cx, &tx, f)?,
        };

        match tx.commit(cx) {
            Ok(()) => {
                tracing::debug!(tx_id = tx.id(), "committed transaction");
                Ok(value)
            }
            Err(commit_err) => {
                guard.disarm();
                match tx.rollback(cx) {
                    Err(rollback_err) if !rollback_err.is_tx_closed() => {
                        tracing::warn!(
                            tx_id = tx.id(),
                            commit_error = %commit_err,
                            error = %rollback_err,
                            "rollback after failed commit failed"
                        );
                        Err(Error::Rollback(rollback_err).into())
                    }
                    _ => Err(Error::Commit(commit_err).into()),
                }
            }
        }
    }

    fn retry<T, E, F>(&self, cx: &Context, tx: &TxHandle, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&Context) -> std::result::Result<T, E>,
        E: StdError + From<Error> + 'static,
    {
        let adapter = TxAdapter::new(tx);
        execute_in_tx(
            cx,
            &adapter,
            &self.config.retry,
            |e: &E| is_serialization_failure(e),
            || f(cx),
        )
        .map_err(|err| match err {
            RetryError::Closure(e) => e,
            RetryError::Savepoint { source, .. } => Error::Driver(source).into(),
            RetryError::Context(e) => Error::Driver(e.into()).into(),
        })
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
