//! SQLite-backed store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never block the writer
//! - `busy_timeout` from [`StoreConfig`] so concurrent writers wait instead of failing
//! - every update runs in a `BEGIN IMMEDIATE` transaction and writes with a
//!   version-checked `UPDATE`, so two processes sharing a file still
//!   serialize per document

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::{CommitHook, Transform, WidgetStore, migrations, next_version, not_found};
use crate::config::StoreConfig;
use crate::error::{EngineError, StoreError};
use crate::model::{ChannelKey, WidgetDocument, WidgetId};

/// Store backed by one SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store file, apply pragmas and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or opening,
    /// configuring or migrating the database fails.
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open widget store {}", path.display()))?;
        Self::from_connection(conn, config)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if configuring or migrating the database fails.
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory widget store")?;
        Self::from_connection(conn, config)
    }

    fn from_connection(mut conn: Connection, config: &StoreConfig) -> Result<Self> {
        configure_connection(&conn, config).context("configure sqlite pragmas")?;
        let version = migrations::migrate(&mut conn).context("apply widget store migrations")?;
        tracing::debug!(schema_version = version, "widget store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn configure_connection(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    // Set first: the remaining pragmas may contend with other writers.
    conn.busy_timeout(config.busy_timeout())?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

fn decode(json: &str) -> Result<WidgetDocument, StoreError> {
    Ok(serde_json::from_str(json)?)
}

fn version_param(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

impl WidgetStore for SqliteStore {
    fn insert(&self, document: &WidgetDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string(document)?;
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO widgets (
                widget_id, channel, kind, version, closed, document_json, created_at_us
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.id.as_str(),
                document.channel.as_str(),
                document.kind.as_str(),
                version_param(document.version),
                document.closed,
                json,
                document.created_at.timestamp_micros(),
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(document.id.to_string()));
        }
        Ok(())
    }

    fn load(&self, id: &WidgetId) -> Result<Option<WidgetDocument>, StoreError> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT document_json FROM widgets WHERE widget_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        json.as_deref().map(decode).transpose()
    }

    fn list_channel(&self, channel: &ChannelKey) -> Result<Vec<WidgetDocument>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT document_json FROM widgets
             WHERE channel = ?1
             ORDER BY created_at_us, widget_id",
        )?;
        let rows = stmt.query_map([channel.as_str()], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for json in rows {
            documents.push(decode(&json?)?);
        }
        Ok(documents)
    }

    fn atomic_update(
        &self,
        id: &WidgetId,
        transform: &mut Transform<'_>,
        committed: &mut CommitHook<'_>,
    ) -> Result<WidgetDocument, EngineError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let json: Option<String> = tx
            .query_row(
                "SELECT document_json FROM widgets WHERE widget_id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Err(not_found(id));
        };
        let current = decode(&json)?;
        let next = next_version(&current, transform)?;

        let updated = tx.execute(
            "UPDATE widgets
             SET version = ?1, closed = ?2, document_json = ?3
             WHERE widget_id = ?4 AND version = ?5",
            params![
                version_param(next.version),
                next.closed,
                serde_json::to_string(&next)?,
                id.as_str(),
                version_param(current.version),
            ],
        )?;
        if updated != 1 {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected: next.version,
            }
            .into());
        }
        tx.commit()?;

        committed(&next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;
    use tempfile::TempDir;

    fn memory() -> SqliteStore {
        SqliteStore::open_in_memory(&StoreConfig::default()).expect("open store")
    }

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("state/widgets.sqlite3");
        (dir, path)
    }

    #[test]
    fn insert_then_load() {
        contract::insert_then_load(&memory());
    }

    #[test]
    fn list_by_channel() {
        contract::list_by_channel(&memory());
    }

    #[test]
    fn update_commits_and_notifies() {
        contract::update_commits_and_notifies(&memory());
    }

    #[test]
    fn rejected_transform_writes_nothing() {
        contract::rejected_transform_writes_nothing(&memory());
    }

    #[test]
    fn missing_document_is_not_found() {
        contract::missing_document_is_not_found(&memory());
    }

    #[test]
    fn version_skips_are_refused() {
        contract::version_skips_are_refused(&memory());
    }

    #[test]
    fn open_sets_wal_and_busy_timeout() {
        let (_dir, path) = temp_db_path();
        let config = StoreConfig {
            busy_timeout_ms: 1234,
        };
        let store = SqliteStore::open(&path, &config).expect("open store");
        let conn = store.lock().expect("lock");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(busy_timeout_ms, 1234);
    }

    #[test]
    fn documents_survive_reopen() {
        let (_dir, path) = temp_db_path();
        let doc = contract::doc("wd-keep", "conv-1", 0);
        {
            let store = SqliteStore::open(&path, &StoreConfig::default()).expect("open");
            store.insert(&doc).expect("insert");
        }
        let store = SqliteStore::open(&path, &StoreConfig::default()).expect("reopen");
        assert_eq!(store.load(&doc.id).expect("load"), Some(doc));
    }

    #[test]
    fn corrupt_json_is_reported() {
        let store = memory();
        store
            .lock()
            .expect("lock")
            .execute(
                "INSERT INTO widgets (widget_id, channel, kind, version, closed, document_json, created_at_us)
                 VALUES ('wd-bad', 'conv-1', 'poll', 0, 0, 'not json', 0)",
                [],
            )
            .expect("raw insert");
        assert!(matches!(
            store.load(&WidgetId::from("wd-bad")),
            Err(StoreError::Codec(_))
        ));
    }
}
