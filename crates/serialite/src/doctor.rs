// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `serialite doctor` command implementation.
//!
//! Runs diagnostic checks against the configured database: schema files,
//! open and health, integrity, and allocator baseline.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use serialite_config::SerialiteConfig;
use serialite_storage::Database;

use crate::{load_schema, open_database};

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check and print a report. Returns false if any check failed.
pub async fn run_doctor(config: &SerialiteConfig, plain: bool) -> bool {
    let use_color = !plain && std::io::stdout().is_terminal();
    let results = collect_checks(config).await;

    println!();
    println!("  serialite doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let fail_count = results.iter().filter(|r| r.status == CheckStatus::Fail).count();
    let warn_count = results.iter().filter(|r| r.status == CheckStatus::Warn).count();
    if fail_count + warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();

    fail_count == 0
}

async fn collect_checks(config: &SerialiteConfig) -> Vec<CheckResult> {
    let mut results = vec![check_config(config), check_schema(config)];

    let (database, db) = check_database(config).await;
    results.push(database);
    if let Some(db) = db {
        results.push(check_integrity(&db).await);
        if let Err(e) = db.shutdown().await {
            results.push(CheckResult::new(
                "Shutdown",
                CheckStatus::Fail,
                e.to_string(),
                Instant::now(),
            ));
        }
    }

    results.push(check_memory_baseline());
    results
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("PASS".green(), result.message.normal()),
            CheckStatus::Warn => ("WARN".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("FAIL".red(), result.message.red()),
        };
        format!("    {symbol} {:<16} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[PASS]",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<16} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Configuration was loaded and validated before doctor ran.
fn check_config(config: &SerialiteConfig) -> CheckResult {
    let start = Instant::now();
    CheckResult::new(
        "Configuration",
        CheckStatus::Pass,
        format!(
            "database {} (wal: {}, busy timeout: {}ms)",
            config.storage.database_path, config.storage.wal_mode, config.storage.busy_timeout_ms
        ),
        start,
    )
}

fn check_schema(config: &SerialiteConfig) -> CheckResult {
    let start = Instant::now();
    match load_schema(&config.storage) {
        Ok(schema) if schema.is_empty() => {
            CheckResult::new("Schema", CheckStatus::Warn, "no schema statements", start)
        }
        Ok(schema) => CheckResult::new(
            "Schema",
            CheckStatus::Pass,
            format!("{} statement file(s)", schema.len()),
            start,
        ),
        Err(e) => CheckResult::new("Schema", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Open the handle (replaying the schema) and run a health probe through the gate.
async fn check_database(config: &SerialiteConfig) -> (CheckResult, Option<Database>) {
    let start = Instant::now();
    let path = &config.storage.database_path;
    let existed = path == ":memory:" || Path::new(path).exists();

    let db = match open_database(&config.storage).await {
        Ok(db) => db,
        Err(e) => {
            return (
                CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
                None,
            );
        }
    };

    let result = match db.health_check().await {
        Ok(()) if existed => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
        Ok(()) => CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("created new database at {path}"),
            start,
        ),
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
    };
    (result, Some(db))
}

async fn check_integrity(db: &Database) -> CheckResult {
    let start = Instant::now();
    match db.integrity_check().await {
        Ok(lines) if lines.len() == 1 && lines[0] == "ok" => {
            CheckResult::new("Integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(lines) => CheckResult::new(
            "Integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", lines.len()),
            start,
        ),
        Err(e) => CheckResult::new("Integrity", CheckStatus::Fail, format!("check failed: {e}"), start),
    }
}

fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new("Memory", CheckStatus::Warn, "jemalloc not available on MSVC", start)
    }
}
