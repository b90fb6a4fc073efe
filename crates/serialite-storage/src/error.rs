// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the store handle.

use thiserror::Error;

/// Every failure a [`Database`](crate::Database) operation can surface.
///
/// The handle never retries and never swallows an error; each kind carries
/// enough detail (engine message, row count) to tell them apart.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the database or replaying the schema failed. The handle was
    /// never constructed and nothing is left open.
    #[error("failed to initialize database at {path}: {source}")]
    Initialization {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The handle was shut down before this operation was attempted.
    #[error("database handle is closed")]
    HandleClosed,

    /// The engine rejected the statement (syntax, constraint, type mismatch).
    #[error("statement failed: {source}")]
    Statement {
        #[from]
        source: rusqlite::Error,
    },

    /// A single-row fetch observed more than one row. The statement still ran.
    #[error("Expected 0 or 1 rows, got {count} rows instead.")]
    TooManyRows { count: usize },

    /// The worker task running a statement failed, or the connection could not be closed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// True for [`StoreError::HandleClosed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::HandleClosed)
    }

    /// The engine error behind a [`StoreError::Statement`], if that is what this is.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            Self::Statement { source } => Some(source),
            _ => None,
        }
    }
}

/// Convert a tokio-rusqlite call failure into a [`StoreError`].
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> StoreError {
    match e {
        tokio_rusqlite::Error::Error(source) => StoreError::Statement { source },
        tokio_rusqlite::Error::ConnectionClosed => StoreError::HandleClosed,
        tokio_rusqlite::Error::Close((_, source)) => {
            StoreError::Internal(format!("failed to close connection: {source}"))
        }
        other => StoreError::Internal(other.to_string()),
    }
}

/// The engine refused to open the database file.
pub(crate) fn open_err(path: &str, e: rusqlite::Error) -> StoreError {
    StoreError::Initialization {
        path: path.to_string(),
        source: Box::new(e),
    }
}

/// Wrap any tokio-rusqlite failure during open or schema replay as an initialization error.
pub(crate) fn init_err<E>(path: &str, e: tokio_rusqlite::Error<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let source: Box<dyn std::error::Error + Send + Sync> = match e {
        tokio_rusqlite::Error::Error(inner) => Box::new(inner),
        tokio_rusqlite::Error::Close((_, inner)) => Box::new(inner),
        tokio_rusqlite::Error::ConnectionClosed => "connection closed during initialization".into(),
        _ => "connection failed during initialization".into(),
    };
    StoreError::Initialization {
        path: path.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_rows_message_carries_count() {
        let err = StoreError::TooManyRows { count: 3 };
        assert_eq!(err.to_string(), "Expected 0 or 1 rows, got 3 rows instead.");
    }

    #[test]
    fn engine_errors_map_to_statement() {
        let err = map_tr_err(tokio_rusqlite::Error::Error(
            rusqlite::Error::QueryReturnedNoRows,
        ));
        assert!(err.sqlite_error().is_some());
        assert!(!err.is_closed());
    }

    #[test]
    fn closed_connection_maps_to_handle_closed() {
        assert!(map_tr_err(tokio_rusqlite::Error::ConnectionClosed).is_closed());
    }

    #[test]
    fn open_failure_is_initialization_with_engine_source() {
        let err = open_err(
            "/no/such/dir/x.db",
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                Some("unable to open database file".to_string()),
            ),
        );
        match err {
            StoreError::Initialization { path, source } => {
                assert_eq!(path, "/no/such/dir/x.db");
                assert!(source.to_string().contains("unable to open"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn init_err_keeps_path_and_source() {
        let err = init_err(
            "/tmp/x.db",
            tokio_rusqlite::Error::Error(rusqlite::Error::InvalidQuery),
        );
        match err {
            StoreError::Initialization { path, source } => {
                assert_eq!(path, "/tmp/x.db");
                assert!(!source.to_string().is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
