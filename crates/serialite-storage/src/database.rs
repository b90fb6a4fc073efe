// SPDX-FileCopyrightText: 2026 Serialite Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serialized store handle.
//!
//! [`Database`] owns the one `tokio_rusqlite::Connection` of the process
//! behind an async mutex (the gate). Every operation acquires the gate, runs
//! one statement on the connection thread, commits, and releases the gate.
//! At most one statement is in flight on the connection at any instant.
//!
//! Do NOT open additional connections to the same file for writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serialite_config::StorageConfig;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::cardinality::Cardinality;
use crate::error::{init_err, map_tr_err, open_err, StoreError};
use crate::params::Params;
use crate::probe::{ConnectionProbe, ProbeStats};
use crate::row::Row;
use crate::schema::Schema;

type Gate = Arc<Mutex<Option<tokio_rusqlite::Connection>>>;

/// Handle to the single connection, shared by cloning.
///
/// Clones share one gate and one connection. Open it once at startup, hand
/// clones to whoever needs storage, and call [`shutdown`](Self::shutdown)
/// once during teardown. A handle dropped without `shutdown` leaves the file
/// open until the connection thread notices every clone is gone.
///
/// The gate is a FIFO-fair `tokio::sync::Mutex`: callers acquire it in the
/// order they started waiting, with no timeout. Statements issued one after
/// another by the same caller run in that order; across callers, the order
/// is whatever the gate hands out.
#[derive(Clone)]
pub struct Database {
    gate: Gate,
    probe: Arc<ConnectionProbe>,
    path: Arc<str>,
    wal_mode: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("wal_mode", &self.wal_mode)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Database {
    /// Open `path` with default storage settings and replay `schema`.
    pub async fn open(path: impl Into<String>, schema: &Schema) -> Result<Self, StoreError> {
        Self::open_with_config(&StorageConfig::with_path(path), schema).await
    }

    /// Open the configured database and replay `schema` before anyone can use it.
    ///
    /// The file is created if absent. Connection settings (busy timeout,
    /// foreign keys, journal mode) are applied first, then the whole schema
    /// runs in one transaction. Any failure closes the connection and returns
    /// [`StoreError::Initialization`]; no handle is produced.
    pub async fn open_with_config(
        config: &StorageConfig,
        schema: &Schema,
    ) -> Result<Self, StoreError> {
        let path = config.database_path.clone();
        ensure_parent_dir(&path)?;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| open_err(&path, e))?;

        let settings = ConnectionSettings::from(config);
        let applied = conn.call(move |c| settings.apply(c)).await;
        let journal = match applied {
            Ok(mode) => mode,
            Err(e) => return Err(abandon(conn, init_err(&path, e)).await),
        };

        let replay = schema.clone();
        let replayed = conn.call(move |c| replay.replay(c)).await;
        if let Err(e) = replayed {
            return Err(abandon(conn, init_err(&path, e)).await);
        }

        info!(
            path = %path,
            journal_mode = %journal,
            schema_statements = schema.len(),
            "database initialized"
        );

        Ok(Self {
            gate: Arc::new(Mutex::new(Some(conn))),
            probe: ConnectionProbe::new(),
            path: path.into(),
            wal_mode: config.wal_mode,
        })
    }

    /// Wait for the in-flight statement, checkpoint the WAL, and close the connection.
    ///
    /// Calling it again after a successful shutdown is a no-op returning `Ok(())`.
    /// Every other operation fails with [`StoreError::HandleClosed`] afterwards.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let mut slot = self.gate.lock().await;
        let Some(conn) = slot.take() else {
            debug!(path = %self.path, "shutdown: already closed");
            return Ok(());
        };

        if self.wal_mode {
            let checkpoint = conn
                .call(|c| c.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())))
                .await;
            match checkpoint {
                Ok(()) => debug!("shutdown: WAL checkpoint complete"),
                Err(e) => warn!(error = %e, "shutdown: WAL checkpoint failed"),
            }
        }

        conn.close().await.map_err(map_tr_err)?;
        info!(path = %self.path, "database closed");
        Ok(())
    }

    /// Run a statement and discard whatever rows it produces.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<(), StoreError> {
        let sql = sql.into();
        let params = params.into();
        self.run("execute", move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = params.query(&mut stmt)?;
            while rows.next()?.is_some() {}
            Ok(())
        })
        .await
    }

    /// Run a statement and return every row it produces, possibly none.
    pub async fn fetch(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Vec<Row>, StoreError> {
        let sql = sql.into();
        let params = params.into();
        self.run("fetch", move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns: Arc<[String]> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let mut rows = params.query(&mut stmt)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(Row::read(&columns, row)?);
            }
            Ok(out)
        })
        .await
    }

    /// Fetch and classify the result against a zero-or-one expectation.
    pub async fn fetch_cardinality(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Cardinality, StoreError> {
        self.fetch(sql, params).await.map(Cardinality::from_rows)
    }

    /// Fetch at most one row.
    ///
    /// No rows is `Ok(None)`. Two or more rows is [`StoreError::TooManyRows`];
    /// the statement has still run and committed, so a writing statement's
    /// effects persist.
    pub async fn fetch_one(
        &self,
        sql: impl Into<String>,
        params: impl Into<Params>,
    ) -> Result<Option<Row>, StoreError> {
        let sql = sql.into();
        let shape = self.fetch_cardinality(sql.as_str(), params).await?;
        if let Cardinality::TooMany(count) = shape {
            debug!(count, sql = %sql, "fetch_one: more than one row");
        }
        shape.into_result()
    }

    /// Run `SELECT 1` through the gate.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.run("health_check", |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))
        })
        .await
    }

    /// `PRAGMA integrity_check`; a healthy file reports `["ok"]`.
    pub async fn integrity_check(&self) -> Result<Vec<String>, StoreError> {
        self.run("integrity_check", |conn| {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let lines = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(lines)
        })
        .await
    }

    /// Copy the live database to `dest` with the online backup API.
    ///
    /// The gate is held for the whole copy, so the snapshot is consistent.
    pub async fn backup_to(&self, dest: impl AsRef<Path>) -> Result<(), StoreError> {
        let dest: PathBuf = dest.as_ref().to_path_buf();
        self.run("backup", move |conn| {
            let mut target = rusqlite::Connection::open(&dest)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut target)?;
            backup.run_to_completion(100, Duration::from_millis(0), None)?;
            Ok(())
        })
        .await
    }

    /// True once [`shutdown`](Self::shutdown) has closed the connection.
    pub async fn is_closed(&self) -> bool {
        self.gate.lock().await.is_none()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stats(&self) -> ProbeStats {
        self.probe.snapshot()
    }

    /// Acquire the gate and run `f` on the connection thread.
    ///
    /// The statement runs in a spawned task that owns the gate guard, so the
    /// gate is released only after the statement has finished, even if the
    /// caller's future is dropped first. A closed handle returns before the
    /// connection is touched.
    async fn run<R, F>(&self, op: &'static str, f: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
    {
        let guard = {
            let _waiting = self.probe.wait();
            Arc::clone(&self.gate).lock_owned().await
        };
        if guard.is_none() {
            return Err(StoreError::HandleClosed);
        }

        let probe = Arc::clone(&self.probe);
        let task = tokio::spawn(run_guarded(guard, probe, move |conn| {
            let out = f(conn)?;
            if !conn.is_autocommit() {
                conn.execute_batch("COMMIT")?;
            }
            Ok(out)
        }));

        let result = task
            .await
            .map_err(|e| StoreError::Internal(format!("{op} task failed: {e}")))?;
        match &result {
            Ok(_) => debug!(op, "statement complete"),
            Err(e) => debug!(op, error = %e, "statement failed"),
        }
        result
    }
}

/// Body of the spawned task; `guard` is dropped (releasing the gate) on return.
///
/// The statement is marked active on the probe from the moment the gate is
/// held until the connection thread hands the result back, so two callers
/// inside the gate at once show up as an overlap.
async fn run_guarded<R, F>(
    guard: OwnedMutexGuard<Option<tokio_rusqlite::Connection>>,
    probe: Arc<ConnectionProbe>,
    f: F,
) -> Result<R, StoreError>
where
    R: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
{
    let Some(conn) = guard.as_ref() else {
        return Err(StoreError::HandleClosed);
    };
    let _active = probe.enter();
    conn.call(f).await.map_err(map_tr_err)
}

/// Close a connection that failed initialization, keeping the original error.
async fn abandon(conn: tokio_rusqlite::Connection, err: StoreError) -> StoreError {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "failed to close connection after initialization error");
    }
    err
}

fn ensure_parent_dir(path: &str) -> Result<(), StoreError> {
    if path == ":memory:" {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Initialization {
                path: path.to_string(),
                source: Box::new(e),
            })
        }
        _ => Ok(()),
    }
}

/// Per-connection PRAGMA setup, applied before schema replay.
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    busy_timeout: Duration,
    foreign_keys: bool,
    wal_mode: bool,
}

impl From<&StorageConfig> for ConnectionSettings {
    fn from(config: &StorageConfig) -> Self {
        Self {
            busy_timeout: config.busy_timeout(),
            foreign_keys: config.foreign_keys,
            wal_mode: config.wal_mode,
        }
    }
}

impl ConnectionSettings {
    /// Apply the settings and return the journal mode SQLite actually chose.
    fn apply(self, conn: &mut rusqlite::Connection) -> rusqlite::Result<String> {
        conn.busy_timeout(self.busy_timeout)?;

        let (journal, synchronous) = if self.wal_mode {
            ("WAL", "NORMAL")
        } else {
            ("DELETE", "FULL")
        };
        let mode: String = conn.query_row(
            &format!("PRAGMA journal_mode = {journal}"),
            [],
            |row| row.get(0),
        )?;
        let foreign_keys = if self.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = {foreign_keys}; PRAGMA synchronous = {synchronous};"
        ))?;
        Ok(mode)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value;
    use tempfile::tempdir;

    use super::*;

    const TABLE: &str = "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)";

    async fn open_temp(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("test.sqlite3");
        Database::open(path.to_string_lossy(), &Schema::new([TABLE]))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_creates_file_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("db.sqlite3");
        let db = Database::open(path.to_string_lossy(), &Schema::new([TABLE]))
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.to_string_lossy());
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn in_memory_database_opens() {
        let db = Database::open(":memory:", &Schema::new([TABLE])).await.unwrap();
        db.execute("INSERT INTO t (name) VALUES (?)", ["x".to_string()])
            .await
            .unwrap();
        assert_eq!(db.fetch("SELECT * FROM t", ()).await.unwrap().len(), 1);
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_applied() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        let row = db.fetch_one("PRAGMA journal_mode", ()).await.unwrap().unwrap();
        assert_eq!(row.get_as::<String>("journal_mode").unwrap(), "wal");
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn delete_journal_when_wal_disabled() {
        let dir = tempdir().unwrap();
        let mut config = StorageConfig::with_path(dir.path().join("d.db").to_string_lossy());
        config.wal_mode = false;
        let db = Database::open_with_config(&config, &Schema::empty()).await.unwrap();
        let row = db.fetch_one("PRAGMA journal_mode", ()).await.unwrap().unwrap();
        assert_eq!(row.get_as::<String>("journal_mode").unwrap(), "delete");
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let schema = Schema::new([
            "CREATE TABLE parent (id INTEGER PRIMARY KEY)",
            "CREATE TABLE child (parent_id INTEGER NOT NULL REFERENCES parent(id))",
        ]);
        let db = Database::open(dir.path().join("fk.db").to_string_lossy(), &schema)
            .await
            .unwrap();
        let err = db
            .execute("INSERT INTO child (parent_id) VALUES (?)", [42i64])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Statement { .. }));
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn execute_discards_rows() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.execute("SELECT 1 UNION ALL SELECT 2", ()).await.unwrap();
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn explicit_begin_is_committed_after_the_statement() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.execute("BEGIN", ()).await.unwrap();
        // If the BEGIN had been left open this would nest and fail.
        db.execute("BEGIN", ()).await.unwrap();
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn multiple_statements_in_one_text_are_rejected() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        let err = db
            .execute("INSERT INTO t (name) VALUES ('a'); INSERT INTO t (name) VALUES ('b')", ())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Statement { .. }));
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn named_params_are_bound() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.execute(
            "INSERT INTO t (id, name) VALUES (:id, :name)",
            Params::named([(":id", Value::Integer(9)), (":name", Value::Text("n".into()))]),
        )
        .await
        .unwrap();
        let row = db
            .fetch_one("SELECT name FROM t WHERE id = :id", Params::named([(":id", 9i64)]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_as::<String>("name").unwrap(), "n");
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn health_and_integrity_checks() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.health_check().await.unwrap();
        assert_eq!(db.integrity_check().await.unwrap(), vec!["ok".to_string()]);
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn backup_copies_rows() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.execute("INSERT INTO t (name) VALUES (?)", ["kept".to_string()])
            .await
            .unwrap();
        let dest = dir.path().join("backup.sqlite3");
        db.backup_to(&dest).await.unwrap();
        db.shutdown().await.unwrap();

        let copy = rusqlite::Connection::open(&dest).unwrap();
        let name: String = copy
            .query_row("SELECT name FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "kept");
    }

    #[tokio::test]
    async fn closed_handle_never_reaches_connection() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        db.health_check().await.unwrap();
        db.shutdown().await.unwrap();
        let before = db.stats().statements;

        assert!(db.health_check().await.unwrap_err().is_closed());
        assert!(db.backup_to(dir.path().join("x")).await.unwrap_err().is_closed());
        assert_eq!(db.stats().statements, before);
        assert!(db.is_closed().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn slow_concurrent_statements_are_held_apart_by_the_gate() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;
        let slow = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 20000) \
                    SELECT COUNT(*) FROM c";

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let db = db.clone();
            tasks.spawn(async move { db.fetch(slow, ()).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let stats = db.stats();
        assert_eq!(stats.statements, 16);
        assert_eq!(stats.peak_active, 1);
        assert_eq!(stats.overlaps, 0);
        db.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn statement_is_active_while_the_gate_is_held() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;

        let guard = Arc::clone(&db.gate).lock_owned().await;
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let call = tokio::spawn(run_guarded(guard, Arc::clone(&db.probe), move |_conn| {
            started_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        }));

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        // A second entry while the first still holds the gate is an overlap.
        drop(db.probe.enter());
        release_tx.send(()).unwrap();
        call.await.unwrap().unwrap();

        let stats = db.stats();
        assert_eq!(stats.peak_active, 2);
        assert_eq!(stats.overlaps, 1);
        db.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_waiter_does_not_poison_the_gate() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;

        let held = db.gate.lock().await;
        let waiter = {
            let db = db.clone();
            tokio::spawn(async move {
                db.execute("INSERT INTO t (name) VALUES ('cancelled')", ()).await
            })
        };
        while db.stats().waiting == 0 {
            tokio::task::yield_now().await;
        }
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(db.stats().waiting, 0);
        drop(held);

        db.execute("INSERT INTO t (name) VALUES ('later')", ())
            .await
            .unwrap();
        let names = db.fetch("SELECT name FROM t", ()).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].get_as::<String>("name").unwrap(), "later");
        db.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_holder_still_finishes_and_releases() {
        let dir = tempdir().unwrap();
        let db = open_temp(&dir).await;

        let slow = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 300000) \
                    INSERT INTO t (name) SELECT 'bulk' FROM c WHERE x = 300000";
        let holder = {
            let db = db.clone();
            tokio::spawn(async move { db.execute(slow, ()).await })
        };
        while db.stats().statements == 0 {
            tokio::task::yield_now().await;
        }
        holder.abort();
        let _ = holder.await;

        let row = db
            .fetch_one("SELECT COUNT(*) AS n FROM t WHERE name = 'bulk'", ())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_as::<i64>("n").unwrap(), 1);
        assert_eq!(db.stats().overlaps, 0);
        db.shutdown().await.unwrap();
    }
}
