// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-file database harness.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use serialite_config::StorageConfig;
use serialite_storage::{Database, Schema, StoreError};

/// The `t(id, name)` table most scenarios run against.
pub const NAMES_TABLE: &str = "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)";

/// Builder for [`TestDatabase`].
pub struct TestDatabaseBuilder {
    schema: Vec<String>,
    wal_mode: bool,
    file_name: String,
}

impl TestDatabaseBuilder {
    fn new() -> Self {
        Self {
            schema: vec![NAMES_TABLE.to_string()],
            wal_mode: true,
            file_name: "test.sqlite3".to_string(),
        }
    }

    /// Replace the schema (the default is [`NAMES_TABLE`]).
    pub fn with_schema<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Storage settings the harness would open with, for a given directory.
    pub fn config_in(&self, dir: &Path) -> StorageConfig {
        StorageConfig {
            wal_mode: self.wal_mode,
            ..StorageConfig::with_path(dir.join(&self.file_name).to_string_lossy())
        }
    }

    pub async fn build(self) -> Result<TestDatabase, StoreError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| StoreError::Initialization {
            path: "<tempdir>".to_string(),
            source: Box::new(e),
        })?;
        let config = self.config_in(temp_dir.path());
        let db = Database::open_with_config(&config, &Schema::new(self.schema)).await?;
        tracing::debug!(path = %config.database_path, "test database ready");
        Ok(TestDatabase {
            db,
            path: PathBuf::from(config.database_path),
            temp_dir,
        })
    }
}

/// An open [`Database`] on a temp file, removed when this value drops.
///
/// Derefs to the handle. Tests that care about shutdown call it themselves;
/// otherwise the temp directory is removed with the handle still open.
pub struct TestDatabase {
    db: Database,
    path: PathBuf,
    temp_dir: tempfile::TempDir,
}

impl TestDatabase {
    pub fn builder() -> TestDatabaseBuilder {
        TestDatabaseBuilder::new()
    }

    /// Harness with the default [`NAMES_TABLE`] schema.
    pub async fn names() -> Result<Self, StoreError> {
        Self::builder().build().await
    }

    /// Another handle clone, for moving into spawned tasks.
    pub fn handle(&self) -> Database {
        self.db.clone()
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the database file; useful for backup targets.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_harness_has_names_table() {
        let db = TestDatabase::names().await.unwrap();
        assert!(db.file_path().exists());
        db.execute("INSERT INTO t (name) VALUES ('x')", ()).await.unwrap();
        assert_eq!(db.fetch("SELECT * FROM t", ()).await.unwrap().len(), 1);
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn custom_schema_replaces_default() {
        let db = TestDatabase::builder()
            .with_schema(["CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)"])
            .with_wal_mode(false)
            .build()
            .await
            .unwrap();
        assert!(db.execute("INSERT INTO t (name) VALUES ('x')", ()).await.is_err());
        db.execute("INSERT INTO kv VALUES ('a', 'b')", ()).await.unwrap();
        db.shutdown().await.unwrap();
    }
}
