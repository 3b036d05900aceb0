//! A scripted, fault-injecting driver.
//!
//! [`ScriptedPool`] implements the driver traits without a database. Every
//! statement, including `BEGIN`, `COMMIT` and `ROLLBACK`, is appended to a
//! log, and faults can be injected for any statement containing a pattern.
//! This makes the transaction protocol itself observable: how many
//! transactions were begun, which statements ran inside them, and how
//! failures at each step are reported.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use txscope_driver::{
    codes, CommandTag, Context, DbError, DriverError, DriverResult, Pool, Queryer, Row, Rows,
    Transaction, Value,
};

/// Statement text logged when a transaction begins.
pub const BEGIN: &str = "BEGIN";
/// Statement text logged for commits.
pub const COMMIT: &str = "COMMIT";
/// Statement text logged for rollbacks.
pub const ROLLBACK: &str = "ROLLBACK";

/// The error a fault produces.
#[derive(Debug, Clone)]
pub enum Fault {
    /// A store error.
    Db(DbError),
    /// A lost connection.
    Connection(String),
    /// An empty result.
    NoRows,
}

impl Fault {
    /// A serialization failure (`40001`).
    pub fn conflict() -> Self {
        Self::Db(DbError::new(
            codes::SERIALIZATION_FAILURE,
            "could not serialize access due to concurrent update",
        ))
    }

    /// A unique violation on `column`.
    pub fn unique(column: &str) -> Self {
        Self::Db(
            DbError::new(
                codes::UNIQUE_VIOLATION,
                format!("duplicate key value violates unique constraint \"users_{column}_key\""),
            )
            .with_column(column),
        )
    }

    fn to_error(&self) -> DriverError {
        match self {
            Self::Db(e) => DriverError::Db(e.clone()),
            Self::Connection(message) => DriverError::Connection(message.clone()),
            Self::NoRows => DriverError::NoRows,
        }
    }
}

/// One logged statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Transaction the statement ran in, `None` for pool statements.
    pub tx: Option<u64>,
    /// Statement text.
    pub sql: String,
}

struct Rule {
    pattern: String,
    fault: Fault,
    remaining: usize,
}

struct Canned {
    pattern: String,
    rows: Rows,
}

#[derive(Default)]
struct Script {
    log: Vec<Event>,
    rules: Vec<Rule>,
    canned: Vec<Canned>,
}

impl Script {
    /// Logs the statement and returns the fault armed for it, if any.
    fn run(&mut self, tx: Option<u64>, sql: &str) -> DriverResult<()> {
        self.log.push(Event {
            tx,
            sql: sql.to_owned(),
        });
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.remaining > 0 && sql.contains(&r.pattern));
        match rule {
            Some(rule) => {
                rule.remaining -= 1;
                Err(rule.fault.to_error())
            }
            None => Ok(()),
        }
    }

    fn rows_for(&self, sql: &str) -> Rows {
        self.canned
            .iter()
            .find(|c| sql.contains(&c.pattern))
            .map(|c| c.rows.clone())
            .unwrap_or_default()
    }
}

struct Shared {
    script: Mutex<Script>,
    next_txid: AtomicU64,
}

impl Shared {
    fn query(&self, cx: &Context, tx: Option<u64>, sql: &str) -> DriverResult<Rows> {
        cx.check()?;
        let mut script = self.script.lock();
        script.run(tx, sql)?;
        Ok(script.rows_for(sql))
    }

    fn exec(&self, cx: &Context, tx: Option<u64>, sql: &str) -> DriverResult<CommandTag> {
        cx.check()?;
        self.script.lock().run(tx, sql)?;
        Ok(CommandTag::new(1))
    }
}

/// A pool whose behavior is scripted by the test.
///
/// Cheap to clone; clones share the script and the log.
#[derive(Clone)]
pub struct ScriptedPool {
    shared: Arc<Shared>,
}

impl ScriptedPool {
    /// Creates a pool where every statement succeeds.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script::default()),
                next_txid: AtomicU64::new(1),
            }),
        }
    }

    /// Fails the next `times` statements containing `pattern` with `fault`.
    ///
    /// Rules are checked in the order they were added.
    pub fn fail_on(&self, pattern: &str, fault: Fault, times: usize) -> &Self {
        self.shared.script.lock().rules.push(Rule {
            pattern: pattern.to_owned(),
            fault,
            remaining: times,
        });
        self
    }

    /// Answers queries containing `pattern` with `rows`. Other queries
    /// return no rows.
    pub fn respond(&self, pattern: &str, rows: Rows) -> &Self {
        self.shared.script.lock().canned.push(Canned {
            pattern: pattern.to_owned(),
            rows,
        });
        self
    }

    /// Returns every logged statement.
    pub fn events(&self) -> Vec<Event> {
        self.shared.script.lock().log.clone()
    }

    /// Returns the text of every logged statement.
    pub fn statements(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.sql).collect()
    }

    /// Counts logged statements containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.shared
            .script
            .lock()
            .log
            .iter()
            .filter(|e| e.sql.contains(pattern))
            .count()
    }
}

impl Default for ScriptedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Queryer for ScriptedPool {
    fn query(&self, cx: &Context, sql: &str, _args: &[Value]) -> DriverResult<Rows> {
        self.shared.query(cx, None, sql)
    }

    fn exec(&self, cx: &Context, sql: &str, _args: &[Value]) -> DriverResult<CommandTag> {
        self.shared.exec(cx, None, sql)
    }
}

impl Pool for ScriptedPool {
    fn begin(&self, cx: &Context) -> DriverResult<Arc<dyn Transaction>> {
        let id = self.shared.next_txid.fetch_add(1, Ordering::Relaxed);
        self.shared.exec(cx, Some(id), BEGIN)?;
        Ok(Arc::new(ScriptedTx {
            id,
            shared: Arc::clone(&self.shared),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A transaction on a [`ScriptedPool`].
///
/// A failed `COMMIT` leaves the transaction open, so the caller's rollback
/// is what closes it.
pub struct ScriptedTx {
    id: u64,
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl ScriptedTx {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(DriverError::TxClosed)
        } else {
            Ok(())
        }
    }
}

impl Queryer for ScriptedTx {
    fn query(&self, cx: &Context, sql: &str, _args: &[Value]) -> DriverResult<Rows> {
        self.ensure_open()?;
        self.shared.query(cx, Some(self.id), sql)
    }

    fn query_row(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<Row> {
        self.query(cx, sql, args)?.into_first()
    }

    fn exec(&self, cx: &Context, sql: &str, _args: &[Value]) -> DriverResult<CommandTag> {
        self.ensure_open()?;
        self.shared.exec(cx, Some(self.id), sql)
    }
}

impl Transaction for ScriptedTx {
    fn commit(&self, cx: &Context) -> DriverResult<()> {
        self.ensure_open()?;
        self.shared.exec(cx, Some(self.id), COMMIT)?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn rollback(&self, _cx: &Context) -> DriverResult<()> {
        self.ensure_open()?;
        // Cleanup runs even after the caller's context is done.
        let result = self.shared.exec(&Context::background(), Some(self.id), ROLLBACK);
        self.closed.store(true, Ordering::Release);
        result.map(|_| ())
    }
}
