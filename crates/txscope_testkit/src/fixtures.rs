//! Test fixtures and database helpers.
//!
//! Every fixture lives in its own temporary directory, removed when the
//! fixture is dropped.

use std::path::PathBuf;
use tempfile::TempDir;
use txscope_core::{Context, Db, TxConfig};
use txscope_sqlite::{BeginMode, SqliteConfig, SqlitePool};

/// Schema used by [`TestDb::with_users`].
pub const USERS_SCHEMA: &str = "
    CREATE TABLE teams (
        id   INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE users (
        name    TEXT PRIMARY KEY,
        email   TEXT UNIQUE,
        team_id INTEGER REFERENCES teams (id)
    );
";

/// A file-backed SQLite database behind a [`Db`].
pub struct TestDb {
    /// The facade under test.
    pub db: Db,
    /// The pool the facade runs on.
    pub pool: SqlitePool,
    temp_dir: TempDir,
}

impl TestDb {
    /// Creates an empty database in plain mode.
    pub fn new() -> Self {
        Self::with_config(TxConfig::default())
    }

    /// Creates an empty database with the given transaction configuration.
    ///
    /// Transactions begin with `BEGIN IMMEDIATE`, so two writers queue on
    /// the busy timeout instead of failing with a stale snapshot.
    pub fn with_config(config: TxConfig) -> Self {
        Self::with_begin_mode(config, BeginMode::Immediate)
    }

    /// Creates an empty database whose transactions begin with `mode`.
    ///
    /// With [`BeginMode::Deferred`] a transaction that has read before
    /// writing loses to a concurrent commit with a serialization failure.
    pub fn with_begin_mode(config: TxConfig, mode: BeginMode) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        let pool = SqlitePool::open(SqliteConfig::new(path).begin_mode(mode))
            .expect("Failed to open test database");
        let db = Db::with_config(pool.clone(), config);
        Self { db, pool, temp_dir }
    }

    /// Creates a database with [`USERS_SCHEMA`] applied.
    pub fn with_users(config: TxConfig) -> Self {
        let test_db = Self::with_config(config);
        test_db.apply(USERS_SCHEMA);
        test_db
    }

    /// Runs every statement of `script` on the pool.
    pub fn apply(&self, script: &str) {
        let cx = Context::background();
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.db
                .exec(&cx, statement, &[])
                .unwrap_or_else(|e| panic!("Failed to apply {statement:?}: {e}"));
        }
    }

    /// Returns the database file path.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("test.db")
    }

    /// Opens a second, independent pool on the same file.
    pub fn reopen(&self) -> Db {
        let pool = SqlitePool::open(SqliteConfig::new(self.path()))
            .expect("Failed to reopen test database");
        Db::new(pool)
    }

    /// Counts the rows of `table` through a fresh pool statement.
    pub fn count(&self, table: &str) -> i64 {
        self.db
            .query_row(
                &Context::background(),
                &format!("SELECT COUNT(*) FROM {table}"),
                &[],
            )
            .expect("Failed to count rows")
            .try_get(0)
            .expect("COUNT(*) is an integer")
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDb {
    type Target = Db;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test against a fresh database with [`USERS_SCHEMA`].
///
/// # Example
///
/// ```rust
/// use txscope_core::{params, Context};
/// use txscope_testkit::with_test_db;
///
/// with_test_db(|db| {
///     let cx = Context::background();
///     db.exec(&cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])
///         .unwrap();
///     assert_eq!(db.count("users"), 1);
/// });
/// ```
pub fn with_test_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDb) -> R,
{
    let test_db = TestDb::with_users(TxConfig::default());
    f(&test_db)
}
