// Key-value persistence: an in-memory map for tests and embedding, and a
// single-table SQLite store for the daemon.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Alert log, newest first.
pub const ALERTS_KEY: &str = "pageAlerts";
/// Extension inventory, id -> record.
pub const EXTENSIONS_KEY: &str = "extensions";
/// Set once the first inventory sync has completed.
pub const INITIALIZED_KEY: &str = "initialized";

/// Held across every read-modify-write on a shared store, so the services
/// built on one store act as a single writer.
pub type WriteLock = Arc<tokio::sync::Mutex<()>>;

pub fn write_lock() -> WriteLock {
    Arc::new(tokio::sync::Mutex::new(()))
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store unavailable")]
    Unavailable,
}

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write every entry or none of them.
    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError>;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.set_many(vec![(key.to_string(), value)])
    }
}

/// Read `key`, logging and swallowing storage failures.
pub fn read_or_none(store: &dyn KvStore, key: &str) -> Option<Value> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "store read failed, using default");
            None
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, to exercise fallback paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut map = self.entries()?;
        map.extend(entries);
        Ok(())
    }
}

// ============================================================================
// SQLite
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        for (key, value) in &entries {
            let text = serde_json::to_string(value)?;
            tx.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, text, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get(ALERTS_KEY).unwrap(), None);

        store
            .set_many(vec![
                (EXTENSIONS_KEY.to_string(), json!({"a": {"id": "a"}})),
                (INITIALIZED_KEY.to_string(), json!(true)),
            ])
            .unwrap();
        assert_eq!(store.get(INITIALIZED_KEY).unwrap(), Some(json!(true)));

        store.set(ALERTS_KEY, json!([{"url": "https://a.test/"}])).unwrap();
        store.set(ALERTS_KEY, json!([])).unwrap();
        assert_eq!(store.get(ALERTS_KEY).unwrap(), Some(json!([])));
        assert_eq!(
            store.get(EXTENSIONS_KEY).unwrap(),
            Some(json!({"a": {"id": "a"}}))
        );
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store_in_memory() {
        exercise(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domsentry.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set(INITIALIZED_KEY, json!(true)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get(INITIALIZED_KEY).unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_unavailable_store_falls_back() {
        let store = MemoryStore::new();
        store.set(ALERTS_KEY, json!([1])).unwrap();
        store.set_unavailable(true);
        assert!(matches!(store.get(ALERTS_KEY), Err(StoreError::Unavailable)));
        assert_eq!(read_or_none(&store, ALERTS_KEY), None);
        store.set_unavailable(false);
        assert_eq!(read_or_none(&store, ALERTS_KEY), Some(json!([1])));
    }
}
