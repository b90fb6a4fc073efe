// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized access to one embedded SQLite database.
//!
//! A [`Database`] owns exactly one connection and runs every statement from
//! every caller through a single async gate, so statements never interleave.
//! Three query shapes are offered: [`Database::execute`] (no result),
//! [`Database::fetch`] (all rows) and [`Database::fetch_one`] (zero or one
//! row, with [`StoreError::TooManyRows`] when a lookup was not unique).
//!
//! ```no_run
//! # async fn demo() -> Result<(), serialite_storage::StoreError> {
//! use serialite_storage::{Database, Schema};
//!
//! let db = Database::open(
//!     "db.sqlite3",
//!     &Schema::new(["CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, name TEXT)"]),
//! )
//! .await?;
//! db.execute("INSERT INTO t (name) VALUES (?)", ["a".to_string()]).await?;
//! let row = db.fetch_one("SELECT * FROM t WHERE name = ?", ["a".to_string()]).await?;
//! assert!(row.is_some());
//! db.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cardinality;
pub mod database;
pub mod error;
pub mod params;
pub mod probe;
pub mod row;
pub mod schema;

pub use cardinality::Cardinality;
pub use database::Database;
pub use error::StoreError;
pub use params::Params;
pub use probe::ProbeStats;
pub use row::{ColumnError, Row};
pub use rusqlite::types::Value;
pub use schema::{Schema, SchemaReplayError};
