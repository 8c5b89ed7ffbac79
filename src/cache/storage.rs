//! SQLite-backed key/value storage for the local image cache

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::persistence::Persistence;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed [`Persistence`] implementation.
///
/// The connection is not `Sync`, so it lives behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/med-mirror on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("med-mirror"))
    }

    /// Open storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        let total_entries: i64 =
            conn.query_row("SELECT COUNT(*) FROM kv_entries", [], |r| r.get(0))?;

        let total_size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM kv_entries",
            [],
            |r| r.get(0),
        )?;

        let last_updated: Option<i64> = conn
            .query_row("SELECT MAX(updated_at) FROM kv_entries", [], |r| r.get(0))
            .optional()?
            .flatten();

        Ok(StoreStats {
            total_entries: total_entries as usize,
            total_size_bytes: total_size as usize,
            last_updated,
        })
    }

    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

impl Persistence for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, Utc::now().timestamp(), value.len()],
        )?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Statistics about stored entries
#[derive(Debug)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: usize,
    /// Unix seconds of the most recent write
    pub last_updated: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open_at(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_write_read() {
        let (store, _dir) = test_store();
        store.write("cachedImage", "data:image/png;base64,AAAA").unwrap();

        let value = store.read("cachedImage").unwrap();
        assert_eq!(value.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_large_value() {
        let (store, _dir) = test_store();
        let value = "x".repeat(3 * 1024 * 1024);
        store.write("big", &value).unwrap();
        assert_eq!(store.read("big").unwrap().map(|v| v.len()), Some(value.len()));
    }

    #[test]
    fn test_clear_missing_key_is_ok() {
        let (store, _dir) = test_store();
        store.clear("nothing").unwrap();
        assert!(store.read("nothing").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open_at(dir.path()).unwrap();
            store.write("k", "v").unwrap();
        }
        let store = SqliteStore::open_at(dir.path()).unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_schema_mismatch_rebuilds() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open_at(dir.path()).unwrap();
            store.write("k", "v").unwrap();
            let conn = store.conn.lock().unwrap();
            conn.pragma_update(None, "user_version", 99).unwrap();
        }
        let store = SqliteStore::open_at(dir.path()).unwrap();
        assert!(store.read("k").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = test_store();
        store.write("a", "12345").unwrap();
        store.write("b", "67").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_size_bytes, 7);
        assert!(stats.last_updated.is_some());
    }
}
