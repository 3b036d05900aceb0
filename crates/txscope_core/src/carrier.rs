//! Carrying the active transaction through a [`Context`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txscope_driver::{CommandTag, Context, DriverResult, Row, Rows, Transaction, Value};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Context key for the active transaction. Private, so only this crate can
/// attach one.
struct TxKey;

/// A live transaction as seen by code running inside [`Db::run_tx`].
///
/// Statements can be issued through it, but only the `run_tx` frame that
/// began the transaction can commit or roll it back.
///
/// [`Db::run_tx`]: crate::Db::run_tx
#[derive(Clone)]
pub struct TxHandle {
    id: u64,
    tx: Arc<dyn Transaction>,
}

impl TxHandle {
    pub(crate) fn new(tx: Arc<dyn Transaction>) -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    /// Process-unique ID, used in log events.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Runs a query inside the transaction.
    pub fn query(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Rows> {
        self.tx.query(cx, sql, args)
    }

    /// Runs a query expected to return at least one row.
    pub fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Row> {
        self.tx.query_row(cx, sql, args)
    }

    /// Executes a statement inside the transaction.
    pub fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<CommandTag> {
        self.tx.exec(cx, sql, args)
    }

    pub(crate) fn commit(&self, cx: &Context) -> DriverResult<()> {
        self.tx.commit(cx)
    }

    pub(crate) fn rollback(&self, cx: &Context) -> DriverResult<()> {
        self.tx.rollback(cx)
    }

    pub(crate) fn rollback_to_savepoint(
        &self,
        cx: &Context,
        savepoint: &str,
    ) -> DriverResult<()> {
        self.tx.rollback_to_savepoint(cx, savepoint)
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Derives a context carrying `tx`. It shadows any transaction an ancestor
/// context carries.
#[must_use]
pub fn with_tx(cx: &Context, tx: TxHandle) -> Context {
    cx.with_value::<TxKey, TxHandle>(tx)
}

/// Returns the transaction carried by `cx`, if any.
///
/// The handle is returned whether or not the transaction is still open.
pub fn tx_from_context(cx: &Context) -> Option<&TxHandle> {
    cx.value::<TxKey, TxHandle>()
}
