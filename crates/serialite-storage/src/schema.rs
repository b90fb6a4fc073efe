// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema statements replayed when the handle opens.
//!
//! The whole list runs inside one transaction: either every entry is applied
//! or none is. Statements that SQLite refuses inside a transaction
//! (`VACUUM`, `PRAGMA journal_mode`) do not belong in a schema list.

use std::path::Path;

use thiserror::Error;

/// Ordered schema statement texts. Each entry may hold several statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    statements: Vec<String>,
}

/// Schema replay failed; nothing from the schema was kept.
#[derive(Debug, Error)]
pub enum SchemaReplayError {
    /// The engine rejected one entry. Everything before it was rolled back.
    #[error("schema statement #{index} failed: {source}")]
    Statement {
        index: usize,
        statement: String,
        source: rusqlite::Error,
    },

    /// The surrounding transaction could not be opened or committed.
    #[error("schema transaction failed to {action}: {source}")]
    Transaction {
        action: &'static str,
        source: rusqlite::Error,
    },
}

impl Schema {
    pub fn new<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.sql` file in `dir`, one entry per file, in file-name order.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                files.push(path);
            }
        }
        files.sort();

        let statements = files
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Apply every entry in order inside a single transaction.
    pub(crate) fn replay(&self, conn: &mut rusqlite::Connection) -> Result<(), SchemaReplayError> {
        let tx = conn
            .transaction()
            .map_err(|source| SchemaReplayError::Transaction {
                action: "begin",
                source,
            })?;
        for (index, statement) in self.statements.iter().enumerate() {
            tx.execute_batch(statement)
                .map_err(|source| SchemaReplayError::Statement {
                    index,
                    statement: statement.clone(),
                    source,
                })?;
        }
        tx.commit().map_err(|source| SchemaReplayError::Transaction {
            action: "commit",
            source,
        })
    }
}
