// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `serialite exec`, `fetch` and `fetch-one`.
//!
//! Rows are written as one JSON object per line, keyed by column name.

use std::io::Write;

use serialite_storage::{Database, Params, Row, Value};

use crate::error::CliError;

/// Interpret one command-line parameter.
///
/// Integers win over reals; the bare word `null` binds SQL NULL; anything
/// else is bound as text.
pub fn parse_param(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Integer(int);
    }
    match raw.parse::<f64>() {
        Ok(real) if real.is_finite() => Value::Real(real),
        _ if raw == "null" => Value::Null,
        _ => Value::Text(raw.to_string()),
    }
}

pub fn parse_params(raw: &[String]) -> Params {
    Params::positional(raw.iter().map(|p| parse_param(p)))
}

pub async fn run_exec(db: &Database, sql: &str, params: &[String]) -> Result<(), CliError> {
    db.execute(sql, parse_params(params)).await?;
    Ok(())
}

/// Print every row; returns how many were printed.
pub async fn run_fetch<W: Write>(
    db: &Database,
    sql: &str,
    params: &[String],
    out: &mut W,
) -> Result<usize, CliError> {
    let rows = db.fetch(sql, parse_params(params)).await?;
    for row in &rows {
        write_row(out, row)?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// Print the single row, or `null` when there is none.
pub async fn run_fetch_one<W: Write>(
    db: &Database,
    sql: &str,
    params: &[String],
    out: &mut W,
) -> Result<Option<Row>, CliError> {
    let row = db.fetch_one(sql, parse_params(params)).await?;
    match &row {
        Some(row) => write_row(out, row)?,
        None => writeln!(out, "null")?,
    }
    out.flush()?;
    Ok(row)
}

pub(crate) fn write_row<W: Write>(out: &mut W, row: &Row) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, row)?;
    writeln!(out)?;
    Ok(())
}
