//! Transaction configuration.

use serde::{Deserialize, Serialize};
use txscope_retry::RetryConfig;

/// How [`Db::run_tx`](crate::Db::run_tx) drives a new transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxMode {
    /// Run the closure once, commit on success.
    #[default]
    Plain,
    /// Replay the closure after serialization failures.
    Retrying,
}

/// Configuration for a [`Db`](crate::Db).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    /// Mode used by `run_tx`.
    pub mode: TxMode,
    /// Backoff and attempt budget for [`TxMode::Retrying`].
    pub retry: RetryConfig,
}

impl TxConfig {
    /// Plain mode with the default retry settings.
    #[must_use]
    pub fn plain() -> Self {
        Self::default()
    }

    /// Retrying mode with the default retry settings.
    #[must_use]
    pub fn retrying() -> Self {
        Self {
            mode: TxMode::Retrying,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: TxMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
