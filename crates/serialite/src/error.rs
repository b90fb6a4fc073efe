// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serialite_storage::StoreError;
use thiserror::Error;

/// Failures a CLI command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode row: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to initialize readline: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("{0}")]
    Usage(String),
}
