// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! serialite - serialized access to one SQLite database from the command line.
//!
//! Every command opens the configured database once, replays the schema,
//! runs through the single store handle, and shuts the handle down.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod backup;
mod doctor;
mod error;
mod query;
mod shell;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serialite_config::{ConfigError, SerialiteConfig, StorageConfig};
use serialite_storage::{Database, Schema, StoreError};
use tracing::{error, info};

use crate::error::CliError;

/// serialite - one SQLite connection, one statement at a time.
#[derive(Parser, Debug)]
#[command(name = "serialite", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file to open, overriding `storage.database_path`.
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a statement and discard any rows it returns.
    Exec {
        sql: String,
        /// Positional parameters: integers, reals, `null`, or text.
        /// Put `--` before text that starts with `-`.
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Run a statement and print every row as a JSON line.
    Fetch {
        sql: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Run a statement that must return at most one row.
    FetchOne {
        sql: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Launch an interactive SQL shell.
    Shell,
    /// Run diagnostic checks against the configured database.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Copy the live database to DEST with the online backup API.
    Backup { dest: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.database) {
        Ok(config) => config,
        Err(errors) => {
            serialite_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log.level);

    if let Commands::Doctor { plain } = cli.command {
        return if doctor::run_doctor(&config, plain).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let db = match open_database(&config.storage).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "failed to open database");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = run_command(&db, cli.command).await;
    let closed = db.shutdown().await.map_err(CliError::from);

    match (outcome, closed) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(e), _) | (Ok(()), Err(e)) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_command(db: &Database, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Exec { sql, params } => query::run_exec(db, &sql, &params).await,
        Commands::Fetch { sql, params } => {
            let mut out = std::io::stdout().lock();
            query::run_fetch(db, &sql, &params, &mut out).await.map(drop)
        }
        Commands::FetchOne { sql, params } => {
            let mut out = std::io::stdout().lock();
            query::run_fetch_one(db, &sql, &params, &mut out).await.map(drop)
        }
        Commands::Shell => shell::run_shell(db).await,
        Commands::Backup { dest } => backup::run_backup(db, &dest).await.map(drop),
        Commands::Doctor { .. } => Err(CliError::Usage(
            "doctor does not run against an open handle".to_string(),
        )),
    }
}

/// Load configuration, then apply the `--database` override.
fn load_config(
    path: Option<&Path>,
    database: Option<String>,
) -> Result<SerialiteConfig, Vec<ConfigError>> {
    let mut config = match path {
        Some(path) => serialite_config::load_and_validate_path(path)?,
        None => serialite_config::load_and_validate()?,
    };
    if let Some(database) = database {
        config.storage.database_path = database;
    }
    Ok(config)
}

/// Schema statements from `storage.schema_dir`, or none.
pub(crate) fn load_schema(storage: &StorageConfig) -> Result<Schema, StoreError> {
    match &storage.schema_dir {
        Some(dir) => Schema::from_dir(Path::new(dir)).map_err(|e| StoreError::Initialization {
            path: dir.clone(),
            source: Box::new(e),
        }),
        None => Ok(Schema::empty()),
    }
}

pub(crate) async fn open_database(storage: &StorageConfig) -> Result<Database, StoreError> {
    let schema = load_schema(storage)?;
    let db = Database::open_with_config(storage, &schema).await?;
    info!(path = %db.path(), "store handle ready");
    Ok(db)
}

/// Log to stderr so stdout carries only command output.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("serialite={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
