//! SQLite pool configuration.

use std::path::PathBuf;
use std::time::Duration;

/// How `BEGIN` acquires locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeginMode {
    /// Take locks lazily on first read/write.
    #[default]
    Deferred,
    /// Take the write lock at `BEGIN`, waiting up to the busy timeout.
    Immediate,
    /// Take an exclusive lock at `BEGIN`.
    Exclusive,
}

impl BeginMode {
    /// Returns the `BEGIN` statement for this mode.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
            Self::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// Configuration for opening a [`crate::SqlitePool`].
///
/// Every pooled connection opens the same database file. An in-memory path
/// (`:memory:`) gives each connection its own private database, so use a
/// file for anything that spans more than one connection.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path.
    pub path: PathBuf,

    /// Upper bound on how long a statement waits for a lock.
    ///
    /// The effective wait is further bounded by the call context deadline.
    pub busy_timeout: Duration,

    /// Maximum number of idle connections kept for reuse.
    pub max_idle: usize,

    /// Lock acquisition mode for `BEGIN`.
    pub begin_mode: BeginMode,

    /// Whether to enforce foreign keys.
    pub foreign_keys: bool,

    /// Whether to switch the database to WAL journaling.
    pub wal: bool,
}

impl SqliteConfig {
    /// Creates a configuration for `path` with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
            max_idle: 8,
            begin_mode: BeginMode::Deferred,
            foreign_keys: true,
            wal: true,
        }
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the maximum number of idle connections.
    #[must_use]
    pub const fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets the `BEGIN` mode.
    #[must_use]
    pub const fn begin_mode(mut self, mode: BeginMode) -> Self {
        self.begin_mode = mode;
        self
    }

    /// Sets whether foreign keys are enforced.
    #[must_use]
    pub const fn foreign_keys(mut self, value: bool) -> Self {
        self.foreign_keys = value;
        self
    }

    /// Sets whether WAL journaling is enabled.
    #[must_use]
    pub const fn wal(mut self, value: bool) -> Self {
        self.wal = value;
        self
    }
}
