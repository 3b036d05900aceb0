//! End-to-end tests against a real SQLite database.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use txscope_core::{
    is_foreign_key_violation_error, is_not_found_error, is_not_null_violation_error,
    is_serialization_failure, is_unique_violation_error, params, tx_from_context, Context,
    ContextError, DriverError, Error, RetryConfig, TxConfig, TxMode,
};
use txscope_sqlite::BeginMode;
use txscope_testkit::{TestDb, USERS_SCHEMA};

fn users(mode: TxMode) -> TestDb {
    TestDb::with_users(TxConfig::default().with_mode(mode))
}

#[test]
fn rename_is_visible_inside_the_transaction() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    db.run_tx(&cx, |cx| {
        db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
        db.exec(
            cx,
            "UPDATE users SET name = ?1 WHERE name = ?2",
            &params!["bob", "alice"],
        )?;

        let missing = db
            .query_row(cx, "SELECT name FROM users WHERE name = ?1", &params!["alice"])
            .unwrap_err();
        assert!(is_not_found_error(&missing));

        let name: String = db
            .query_row(cx, "SELECT name FROM users WHERE name = ?1", &params!["bob"])?
            .try_get(0)?;
        assert_eq!(name, "bob");

        // Not visible outside the transaction yet.
        let outside = db.reopen();
        let rows = outside.query(&Context::background(), "SELECT name FROM users", &[])?;
        assert!(rows.is_empty());
        Ok::<_, Error>(())
    })
    .unwrap();

    assert_eq!(db.count("users"), 1);
}

#[test]
fn closure_error_discards_every_write() {
    let db = users(TxMode::Plain);
    let cx = Context::background();
    db.exec(&cx, "INSERT INTO teams (id, name) VALUES (1, 'core')", &[])
        .unwrap();

    let err = db
        .run_tx(&cx, |cx| {
            db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
            db.exec(cx, "UPDATE teams SET name = 'renamed' WHERE id = 1", &[])?;
            db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
            Ok::<_, Error>(())
        })
        .unwrap_err();

    assert!(is_unique_violation_error(&err, &["name"]));
    assert_eq!(db.count("users"), 0);
    let team: String = db
        .query_row(&cx, "SELECT name FROM teams WHERE id = 1", &[])
        .unwrap()
        .try_get(0)
        .unwrap();
    assert_eq!(team, "core");
}

#[test]
fn committed_writes_survive_a_new_pool() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    db.run_tx(&cx, |cx| {
        db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
        db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["bob"])?;
        Ok::<_, Error>(())
    })
    .unwrap();

    let other = db.reopen();
    let rows = other
        .query(&cx, "SELECT name FROM users ORDER BY name", &[])
        .unwrap();
    let names: Vec<String> = rows.iter().map(|r| r.try_get(0).unwrap()).collect();
    assert_eq!(names, ["alice", "bob"]);
}

#[test]
fn nested_run_tx_shares_one_transaction() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    db.run_tx(&cx, |outer| {
        let outer_id = tx_from_context(outer).map(|tx| tx.id());
        db.exec(outer, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;

        db.run_tx(outer, |inner| {
            assert_eq!(tx_from_context(inner).map(|tx| tx.id()), outer_id);
            // The inner closure sees the outer closure's write.
            db.query_row(inner, "SELECT name FROM users WHERE name = ?1", &params!["alice"])?;
            db.exec(inner, "INSERT INTO users (name) VALUES (?1)", &params!["bob"])?;
            Ok::<_, Error>(())
        })?;

        // Nothing is committed by the inner call.
        assert_eq!(db.count("users"), 0);
        Ok::<_, Error>(())
    })
    .unwrap();

    assert_eq!(db.count("users"), 2);
}

#[test]
fn not_found_on_pool_and_in_transaction() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    let err = db
        .query_row(&cx, "SELECT name FROM users WHERE name = ?1", &params!["nobody"])
        .unwrap_err();
    assert!(is_not_found_error(&err));

    let err = db
        .run_tx(&cx, |cx| {
            db.query_row(cx, "SELECT name FROM users WHERE name = ?1", &params!["nobody"])?;
            Ok::<_, Error>(())
        })
        .unwrap_err();
    assert!(is_not_found_error(&err));
}

#[test]
fn unique_violation_hints_pick_the_column() {
    let db = users(TxMode::Plain);
    let cx = Context::background();
    db.exec(
        &cx,
        "INSERT INTO users (name, email) VALUES (?1, ?2)",
        &params!["alice", "a@example.com"],
    )
    .unwrap();

    let dup_name = db
        .exec(
            &cx,
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            &params!["alice", "other@example.com"],
        )
        .unwrap_err();
    assert!(is_unique_violation_error(&dup_name, &[]));
    assert!(is_unique_violation_error(&dup_name, &["name"]));
    assert!(!is_unique_violation_error(&dup_name, &["email"]));

    let dup_email = db
        .exec(
            &cx,
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            &params!["bob", "a@example.com"],
        )
        .unwrap_err();
    assert!(is_unique_violation_error(&dup_email, &["email"]));
    assert!(!is_unique_violation_error(&dup_email, &["name"]));
}

#[test]
fn not_null_and_foreign_key_violations_classify() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    let err = db
        .exec(&cx, "INSERT INTO teams (id, name) VALUES (1, NULL)", &[])
        .unwrap_err();
    assert!(is_not_null_violation_error(&err, &["name"]));
    assert!(!is_unique_violation_error(&err, &[]));

    let err = db
        .exec(
            &cx,
            "INSERT INTO users (name, team_id) VALUES (?1, ?2)",
            &params!["alice", 42],
        )
        .unwrap_err();
    assert!(is_foreign_key_violation_error(&err, &[]));
}

fn race_same_key(mode: TxMode) {
    let config = TxConfig::default()
        .with_mode(mode)
        .with_retry(RetryConfig::new(5).with_initial_delay(Duration::from_millis(1)));
    let db = Arc::new(TestDb::with_users(config));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let cx = Context::background();
                barrier.wait();
                db.run_tx(&cx, |cx| {
                    db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["dup"])?;
                    Ok::<_, Error>(())
                })
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("writer panicked"))
        .collect();

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    let err = results
        .into_iter()
        .find_map(Result::err)
        .expect("one writer must fail");
    assert!(is_unique_violation_error(&err, &["name"]), "got {err}");
    assert_eq!(db.count("users"), 1);
}

#[test]
fn concurrent_same_key_insert_plain() {
    race_same_key(TxMode::Plain);
}

#[test]
fn concurrent_same_key_insert_retrying() {
    race_same_key(TxMode::Retrying);
}

fn deferred(mode: TxMode) -> TestDb {
    let config = TxConfig::default()
        .with_mode(mode)
        .with_retry(RetryConfig::new(5).with_initial_delay(Duration::from_millis(1)));
    let db = TestDb::with_begin_mode(config, BeginMode::Deferred);
    db.apply(USERS_SCHEMA);
    db
}

/// Reads `teams`, lets another connection commit a team on the first call,
/// then writes. The write finds the read snapshot out of date.
fn read_then_write(db: &TestDb, cx: &Context, seen: &mut Vec<i64>) -> Result<(), Error> {
    let teams: i64 = db
        .query_row(cx, "SELECT COUNT(*) FROM teams", &[])?
        .try_get(0)?;
    seen.push(teams);
    if seen.len() == 1 {
        db.exec(
            &Context::background(),
            "INSERT INTO teams (id, name) VALUES (1, 'core')",
            &[],
        )?;
    }
    db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
    Ok(())
}

#[test]
fn retrying_replays_after_a_stale_snapshot() {
    let db = deferred(TxMode::Retrying);
    let mut seen = Vec::new();

    db.run_tx(&Context::background(), |cx| read_then_write(&db, cx, &mut seen))
        .unwrap();

    // The replay ran on a fresh snapshot that includes the concurrent team.
    assert_eq!(seen, [0, 1]);
    assert_eq!(db.count("users"), 1);
    assert_eq!(db.count("teams"), 1);
}

#[test]
fn plain_mode_surfaces_a_stale_snapshot() {
    let db = deferred(TxMode::Plain);
    let mut seen = Vec::new();

    let err = db
        .run_tx(&Context::background(), |cx| read_then_write(&db, cx, &mut seen))
        .unwrap_err();

    assert!(is_serialization_failure(&err), "got {err}");
    assert_eq!(seen, [0]);
    assert_eq!(db.count("users"), 0);
    assert_eq!(db.count("teams"), 1);
}

#[test]
fn exec_accepts_row_returning_statements() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    assert_eq!(db.exec(&cx, "SELECT 1", &[]).unwrap().rows_affected, 1);

    db.run_tx(&cx, |cx| {
        let tag = db.exec(
            cx,
            "INSERT INTO users (name) VALUES (?1) RETURNING name",
            &params!["alice"],
        )?;
        assert_eq!(tag.rows_affected, 1);
        Ok::<_, Error>(())
    })
    .unwrap();
    assert_eq!(db.count("users"), 1);
}

#[test]
fn panic_in_closure_rolls_back() {
    let db = users(TxMode::Plain);
    let cx = Context::background();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = db.run_tx(&cx, |cx| -> Result<(), Error> {
            db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
            panic!("boom");
        });
    }));

    assert!(outcome.is_err());
    assert_eq!(db.count("users"), 0);
    // The connection went back to the pool usable.
    db.exec(&cx, "INSERT INTO users (name) VALUES (?1)", &params!["bob"])
        .unwrap();
    assert_eq!(db.count("users"), 1);
}

#[test]
fn cancelled_context_fails_statements_and_rolls_back() {
    let db = users(TxMode::Plain);
    let (cx, cancel) = Context::background().with_cancel();

    let err = db
        .run_tx(&cx, |cx| {
            db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"])?;
            cancel.cancel();
            db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params!["bob"])?;
            Ok::<_, Error>(())
        })
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Driver(DriverError::Context(ContextError::Cancelled))
    ));
    assert_eq!(db.count("users"), 0);
}

#[test]
fn expired_deadline_fails_before_begin() {
    let db = users(TxMode::Plain);
    let cx = Context::background().with_timeout(Duration::ZERO);

    let mut ran = false;
    let err = db
        .run_tx(&cx, |_| {
            ran = true;
            Ok::<_, Error>(())
        })
        .unwrap_err();

    assert!(!ran);
    assert!(matches!(
        err,
        Error::Begin(DriverError::Context(ContextError::DeadlineExceeded))
    ));
}
