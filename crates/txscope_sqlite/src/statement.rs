//! Round-trips on a single connection.

use crate::error::map_err;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;
use std::time::Duration;
use txscope_driver::{CommandTag, Context, DriverResult, Row, Rows, Value};

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(v),
        SqlValue::Real(v) => Value::Real(v),
        SqlValue::Text(v) => Value::Text(v),
        SqlValue::Blob(v) => Value::Blob(v),
    }
}

/// Checks the context and bounds the lock wait by its deadline.
fn prepare_call(conn: &Connection, cx: &Context, busy_timeout: Duration) -> DriverResult<()> {
    cx.check()?;
    let timeout = cx
        .remaining()
        .map_or(busy_timeout, |remaining| remaining.min(busy_timeout));
    conn.busy_timeout(timeout).map_err(map_err)
}

pub(crate) fn query(
    conn: &Connection,
    cx: &Context,
    busy_timeout: Duration,
    sql: &str,
    args: &[Value],
) -> DriverResult<Rows> {
    prepare_call(conn, cx, busy_timeout)?;
    tracing::trace!(sql, args = args.len(), "query");

    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let width = columns.len();

    let mut rows = stmt
        .query(params_from_iter(args.iter().map(to_sql)))
        .map_err(map_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_err)? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_sql(row.get::<_, SqlValue>(i).map_err(map_err)?));
        }
        out.push(Row::new(Arc::clone(&columns), values));
    }
    Ok(Rows::new(columns, out))
}

pub(crate) fn query_row(
    conn: &Connection,
    cx: &Context,
    busy_timeout: Duration,
    sql: &str,
    args: &[Value],
) -> DriverResult<Row> {
    query(conn, cx, busy_timeout, sql, args)?.into_first()
}

pub(crate) fn exec(
    conn: &Connection,
    cx: &Context,
    busy_timeout: Duration,
    sql: &str,
    args: &[Value],
) -> DriverResult<CommandTag> {
    prepare_call(conn, cx, busy_timeout)?;
    tracing::trace!(sql, args = args.len(), "exec");

    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let params = params_from_iter(args.iter().map(to_sql));
    if stmt.column_count() == 0 {
        let changed = stmt.execute(params).map_err(map_err)?;
        return Ok(CommandTag::new(changed as u64));
    }

    // Row-returning statements run to completion and report the row count.
    let mut rows = stmt.query(params).map_err(map_err)?;
    let mut returned = 0;
    while rows.next().map_err(map_err)?.is_some() {
        returned += 1;
    }
    Ok(CommandTag::new(returned))
}

/// Runs a transaction control statement (`BEGIN`, `COMMIT`, ...).
pub(crate) fn control(
    conn: &Connection,
    cx: &Context,
    busy_timeout: Duration,
    sql: &str,
) -> DriverResult<()> {
    prepare_call(conn, cx, busy_timeout)?;
    tracing::trace!(sql, "control");
    conn.execute_batch(sql).map_err(map_err)
}
