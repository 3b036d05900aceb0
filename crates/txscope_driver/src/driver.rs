//! Driver trait definitions.

use crate::context::Context;
use crate::error::DriverResult;
use crate::row::{CommandTag, Row, Rows};
use crate::value::Value;
use std::sync::Arc;

/// Something statements can be issued against: a pool or a transaction.
///
/// # Invariants
///
/// - Every method checks `cx` before touching the store and fails with
///   [`crate::DriverError::Context`] if it is cancelled or expired.
/// - Each call is one round-trip; no retry happens at this level.
/// - Statements issued on the same transaction run in issue order.
pub trait Queryer: Send + Sync {
    /// Runs a row-returning statement and materializes every row.
    fn query(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Rows>;

    /// Runs a row-returning statement and returns its first row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DriverError::NoRows`] when nothing matched.
    fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Row> {
        self.query(cx, sql, args)?.into_first()
    }

    /// Runs a statement, discarding any rows it returns.
    fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<CommandTag>;
}

/// A set of connections to the store.
///
/// The pool is shared for the process lifetime. Statements issued directly
/// on it run in autocommit mode on whichever connection is free.
pub trait Pool: Queryer {
    /// Begins a transaction on a dedicated connection.
    fn begin(&self, cx: &Context) -> DriverResult<Arc<dyn Transaction>>;
}

/// A live server-side transaction bound to one connection.
///
/// # Invariants
///
/// - Terminated at most once. After `commit` or `rollback` has completed,
///   every further call (including another `commit` or `rollback`) fails
///   with [`crate::DriverError::TxClosed`].
/// - A failed `commit` leaves the transaction open if the store still
///   considers it open, so the owner can roll it back.
pub trait Transaction: Queryer {
    /// Commits the transaction.
    fn commit(&self, cx: &Context) -> DriverResult<()>;

    /// Rolls the transaction back.
    fn rollback(&self, cx: &Context) -> DriverResult<()>;

    /// Discards everything issued since `savepoint` and keeps the savepoint.
    ///
    /// Only called for a savepoint taken as the first statement of the
    /// transaction. A driver whose savepoints keep a stale read snapshot may
    /// instead roll back, begin again on the same connection and retake the
    /// savepoint.
    fn rollback_to_savepoint(&self, cx: &Context, savepoint: &str) -> DriverResult<()> {
        self.exec(cx, &format!("ROLLBACK TO SAVEPOINT {savepoint}"), &[])
            .map(|_| ())
    }
}
