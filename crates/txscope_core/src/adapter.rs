//! Bridges a [`TxHandle`] to the retry engine.

use crate::carrier::TxHandle;
use txscope_driver::{Context, DriverResult, Value};
use txscope_retry::{RetryTx, RESTART_SAVEPOINT, ROLLBACK_TO_SQL};

/// Presents a transaction as the retry engine's [`RetryTx`], discarding the
/// command tag of each statement.
///
/// Only built right after `BEGIN`, so the engine's restart savepoint is
/// always the first statement of the transaction. Its rewind is handed to
/// [`Transaction::rollback_to_savepoint`] so the driver can pick how to
/// rewind.
///
/// [`Transaction::rollback_to_savepoint`]: txscope_driver::Transaction::rollback_to_savepoint
pub(crate) struct TxAdapter<'a> {
    tx: &'a TxHandle,
}

impl<'a> TxAdapter<'a> {
    pub(crate) fn new(tx: &'a TxHandle) -> Self {
        Self { tx }
    }
}

impl RetryTx for TxAdapter<'_> {
    fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<()> {
        if sql == ROLLBACK_TO_SQL {
            return self.tx.rollback_to_savepoint(cx, RESTART_SAVEPOINT);
        }
        self.tx.exec(cx, sql, args).map(|_| ())
    }
}
