// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `serialite backup` command implementation.
//!
//! Copies through the open handle with SQLite's online backup API, so the
//! copy is taken between statements and is consistent.

use std::path::Path;

use serialite_storage::Database;
use tracing::info;

use crate::error::CliError;

/// Back up the database to `dest`, returning the size of the copy in bytes.
///
/// An existing file at `dest` is never overwritten.
pub async fn run_backup(db: &Database, dest: &Path) -> Result<u64, CliError> {
    if dest.exists() {
        return Err(CliError::Usage(format!(
            "backup destination already exists: {}",
            dest.display()
        )));
    }

    db.backup_to(dest).await?;

    let size = std::fs::metadata(dest)?.len();
    let size_mb = size as f64 / (1024.0 * 1024.0);
    info!(dest = %dest.display(), bytes = size, "backup complete");
    eprintln!("Backup complete: {size_mb:.1} MB written to {}", dest.display());
    Ok(size)
}
