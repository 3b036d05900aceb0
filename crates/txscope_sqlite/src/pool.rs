//! Connection pool.

use crate::config::SqliteConfig;
use crate::error::map_err;
use crate::statement;
use crate::transaction::SqliteTx;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txscope_driver::{
    CommandTag, Context, DriverError, DriverResult, Pool, Queryer, Row, Rows, Transaction, Value,
};

pub(crate) struct Shared {
    config: SqliteConfig,
    idle: Mutex<Vec<Connection>>,
    next_txid: AtomicU64,
}

impl Shared {
    fn open_connection(&self) -> DriverResult<Connection> {
        let conn = Connection::open(&self.config.path).map_err(|e| {
            DriverError::connection(format!("open {}: {e}", self.config.path.display()))
        })?;
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)
            .map_err(map_err)?;
        if self.config.wal {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_err)?;
        }
        Ok(conn)
    }

    fn acquire(self: &Arc<Self>) -> DriverResult<PooledConnection> {
        let idle = self.idle.lock().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(self),
        })
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.config.max_idle {
            idle.push(conn);
        }
    }
}

/// A connection checked out of the pool.
///
/// Returned on drop. A connection still inside a transaction is rolled back
/// first so the next borrower starts in autocommit mode.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    shared: Arc<Shared>,
}

impl PooledConnection {
    pub(crate) fn config(&self) -> &SqliteConfig {
        &self.shared.config
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .unwrap_or_else(|| unreachable!("connection taken before drop"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %e, "discarding connection left inside a transaction");
                    return;
                }
            }
            self.shared.release(conn);
        }
    }
}

/// A pool of SQLite connections to one database file.
///
/// Cheap to clone; clones share the same idle list.
#[derive(Clone)]
pub struct SqlitePool {
    shared: Arc<Shared>,
}

impl SqlitePool {
    /// Opens a pool, verifying the database can be opened.
    pub fn open(config: SqliteConfig) -> DriverResult<Self> {
        let shared = Arc::new(Shared {
            config,
            idle: Mutex::new(Vec::new()),
            next_txid: AtomicU64::new(1),
        });
        let conn = shared.open_connection()?;
        shared.release(conn);
        tracing::debug!(path = %shared.config.path.display(), "opened sqlite pool");
        Ok(Self { shared })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SqliteConfig {
        &self.shared.config
    }

    /// Returns the number of idle connections.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.shared.idle.lock().len()
    }
}

impl std::fmt::Debug for SqlitePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePool")
            .field("path", &self.shared.config.path)
            .field("idle", &self.idle_count())
            .finish_non_exhaustive()
    }
}

impl Queryer for SqlitePool {
    fn query(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Rows> {
        cx.check()?;
        let conn = self.shared.acquire()?;
        statement::query(&conn, cx, conn.config().busy_timeout, sql, args)
    }

    fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Row> {
        cx.check()?;
        let conn = self.shared.acquire()?;
        statement::query_row(&conn, cx, conn.config().busy_timeout, sql, args)
    }

    fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<CommandTag> {
        cx.check()?;
        let conn = self.shared.acquire()?;
        statement::exec(&conn, cx, conn.config().busy_timeout, sql, args)
    }
}

impl Pool for SqlitePool {
    fn begin(&self, cx: &Context) -> DriverResult<Arc<dyn Transaction>> {
        cx.check()?;
        let conn = self.shared.acquire()?;
        let config = conn.config();
        statement::control(&conn, cx, config.busy_timeout, config.begin_mode.sql())?;

        let id = self.shared.next_txid.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(tx_id = id, "began sqlite transaction");
        Ok(Arc::new(SqliteTx::new(id, conn)))
    }
}
