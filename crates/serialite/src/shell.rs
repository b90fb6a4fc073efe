// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `serialite shell` command implementation.
//!
//! A readline REPL over the open handle. Plain input is fetched and printed
//! as JSON lines; dot-commands pick the other query shapes.

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serialite_storage::Database;

use crate::error::CliError;
use crate::query::write_row;

/// One line of shell input.
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand<'a> {
    Empty,
    Quit,
    Stats,
    Help,
    One(&'a str),
    Exec(&'a str),
    Fetch(&'a str),
    Unknown(&'a str),
}

fn parse_line(line: &str) -> ShellCommand<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ShellCommand::Empty;
    }
    if !trimmed.starts_with('.') {
        return ShellCommand::Fetch(trimmed);
    }

    let (word, rest) = trimmed
        .split_once(char::is_whitespace)
        .map_or((trimmed, ""), |(w, r)| (w, r.trim()));
    match word {
        ".quit" | ".exit" => ShellCommand::Quit,
        ".stats" => ShellCommand::Stats,
        ".help" => ShellCommand::Help,
        ".one" if !rest.is_empty() => ShellCommand::One(rest),
        ".exec" if !rest.is_empty() => ShellCommand::Exec(rest),
        _ => ShellCommand::Unknown(word),
    }
}

/// Run the interactive shell until `.quit`, Ctrl+C or Ctrl+D.
pub async fn run_shell(db: &Database) -> Result<(), CliError> {
    let mut rl = DefaultEditor::new()?;

    println!("{}", "serialite shell".bold().green());
    println!("Connected to {}. Type {} for commands.\n", db.path(), ".help".yellow());

    let prompt = format!("{}> ", "serialite".green());
    loop {
        let line = match off_worker(|| rl.readline(&prompt)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };

        let command = parse_line(&line);
        if command == ShellCommand::Quit {
            break;
        }
        if command != ShellCommand::Empty {
            let _ = rl.add_history_entry(line.as_str());
        }

        let mut out = Vec::new();
        let result = dispatch(db, command, &mut out).await;
        print!("{}", String::from_utf8_lossy(&out));
        if let Err(e) = result {
            eprintln!("{}: {e}", "error".red());
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Run blocking terminal input without stalling the runtime's other tasks.
///
/// Needs the multi-threaded runtime that `#[tokio::main]` builds.
fn off_worker<R>(f: impl FnOnce() -> R) -> R {
    tokio::task::block_in_place(f)
}

async fn dispatch(
    db: &Database,
    command: ShellCommand<'_>,
    out: &mut Vec<u8>,
) -> Result<(), CliError> {
    use std::io::Write;

    match command {
        ShellCommand::Empty | ShellCommand::Quit => {}
        ShellCommand::Help => {
            writeln!(out, "  <sql>        run and print every row")?;
            writeln!(out, "  .one <sql>   expect at most one row")?;
            writeln!(out, "  .exec <sql>  run and discard rows")?;
            writeln!(out, "  .stats       gate and connection counters")?;
            writeln!(out, "  .quit        leave the shell")?;
        }
        ShellCommand::Stats => {
            let stats = db.stats();
            writeln!(
                out,
                "statements: {}  peak active: {}  overlaps: {}  waiting: {}",
                stats.statements, stats.peak_active, stats.overlaps, stats.waiting
            )?;
        }
        ShellCommand::Fetch(sql) => {
            let rows = db.fetch(sql, ()).await?;
            for row in &rows {
                write_row(out, row)?;
            }
            let noun = if rows.len() == 1 { "row" } else { "rows" };
            writeln!(out, "{}", format!("({} {noun})", rows.len()).dimmed())?;
        }
        ShellCommand::One(sql) => match db.fetch_one(sql, ()).await? {
            Some(row) => write_row(out, &row)?,
            None => writeln!(out, "null")?,
        },
        ShellCommand::Exec(sql) => {
            db.execute(sql, ()).await?;
            writeln!(out, "{}", "ok".dimmed())?;
        }
        ShellCommand::Unknown(word) => {
            return Err(CliError::Usage(format!(
                "unknown command {word:?}; try .help"
            )));
        }
    }
    Ok(())
}
