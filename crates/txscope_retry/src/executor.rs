//! The replay loop.

use crate::config::RetryConfig;
use crate::error::RetryError;
use std::time::Duration;
use txscope_driver::{codes, Context, DriverError, DriverResult, Value};

macro_rules! restart_savepoint {
    () => {
        "txscope_restart"
    };
}

/// Savepoint marking the start of every attempt.
pub const RESTART_SAVEPOINT: &str = restart_savepoint!();

const SAVEPOINT_SQL: &str = concat!("SAVEPOINT ", restart_savepoint!());
const RELEASE_SQL: &str = concat!("RELEASE SAVEPOINT ", restart_savepoint!());

/// Statement the engine issues to rewind before a replay.
pub const ROLLBACK_TO_SQL: &str = concat!("ROLLBACK TO SAVEPOINT ", restart_savepoint!());

/// The transaction surface the retry engine drives.
///
/// Only statement execution is needed: the engine never reads rows, and the
/// signal to retry comes from the error a statement (or the closure) returns.
pub trait RetryTx {
    /// Executes one statement inside the transaction.
    fn exec(&self, cx: &Context, sql: &str, args: &[Value]) -> DriverResult<()>;
}

fn is_conflict(err: &DriverError) -> bool {
    err.as_db_error()
        .is_some_and(|db| codes::is_retryable(&db.code))
}

enum Failure<E> {
    Closure(E),
    Release(DriverError),
}

impl<E> Failure<E> {
    fn into_error(self) -> RetryError<E> {
        match self {
            Self::Closure(e) => RetryError::Closure(e),
            Self::Release(source) => RetryError::Savepoint {
                statement: RELEASE_SQL,
                source,
            },
        }
    }
}

/// Runs `f` inside `tx`, replaying it after retryable conflicts.
///
/// Protocol:
///
/// 1. `SAVEPOINT txscope_restart`
/// 2. run `f`; on success `RELEASE SAVEPOINT txscope_restart` and return
/// 3. on an error `is_retryable` accepts (or a conflict reported by the
///    release), `ROLLBACK TO SAVEPOINT txscope_restart`, back off, go to 2
///
/// Errors `is_retryable` rejects are returned at once as
/// [`RetryError::Closure`]. After `config.max_attempts` attempts the last
/// closure error is returned. The backoff never sleeps past the context
/// deadline, and a cancelled or expired context stops the loop with
/// [`RetryError::Context`].
///
/// The engine neither commits nor rolls back the transaction itself; that
/// stays with whoever began it. `f` must be safe to run more than once.
pub fn execute_in_tx<T, E, F, P>(
    cx: &Context,
    tx: &dyn RetryTx,
    config: &RetryConfig,
    is_retryable: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    P: Fn(&E) -> bool,
{
    cx.check()?;
    tx.exec(cx, SAVEPOINT_SQL, &[])
        .map_err(|source| RetryError::Savepoint {
            statement: SAVEPOINT_SQL,
            source,
        })?;

    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        let failure = match f() {
            Ok(value) => match tx.exec(cx, RELEASE_SQL, &[]) {
                Ok(()) => return Ok(value),
                Err(e) if is_conflict(&e) => Failure::Release(e),
                Err(source) => {
                    return Err(RetryError::Savepoint {
                        statement: RELEASE_SQL,
                        source,
                    })
                }
            },
            Err(e) if is_retryable(&e) => Failure::Closure(e),
            Err(e) => return Err(RetryError::Closure(e)),
        };

        attempt += 1;
        if attempt >= max_attempts {
            tracing::warn!(attempts = attempt, "transaction retry limit reached");
            return Err(failure.into_error());
        }

        tx.exec(cx, ROLLBACK_TO_SQL, &[])
            .map_err(|source| RetryError::Savepoint {
                statement: ROLLBACK_TO_SQL,
                source,
            })?;

        let delay = clamp_to_deadline(config.delay_for_attempt(attempt), cx);
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "replaying transaction after conflict"
        );
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        cx.check()?;
    }
}

fn clamp_to_deadline(delay: Duration, cx: &Context) -> Duration {
    cx.remaining()
        .map_or(delay, |remaining| delay.min(remaining))
}
