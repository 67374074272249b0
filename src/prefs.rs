//! Injected preference storage.
//!
//! The crate never decides where preferences live; the embedding application
//! injects a `PrefStore`. A SQLite-backed implementation is provided for
//! hosts that want durable preferences on disk.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::info;

use crate::error::DriftwatchError;

/// Key-value preference storage.
pub trait PrefStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, String>;
    fn set(&self, key: &str, value: &str) -> Result<(), String>;
}

/// SQLite-backed preference store.
pub struct SqlitePrefStore {
    conn: Mutex<Connection>,
}

impl SqlitePrefStore {
    /// Open (or create) the preference database at the given path.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn new(db_path: &Path) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DriftwatchError::Store(format!("Failed to create preference directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            DriftwatchError::Store(format!("Failed to open preference database: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS prefs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| DriftwatchError::Store(format!("Failed to create prefs table: {}", e)))?;

        info!("Preference store opened at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PrefStore for SqlitePrefStore {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut stmt = conn
            .prepare("SELECT value FROM prefs WHERE key = ?1")
            .map_err(|e| format!("Failed to prepare preference query: {}", e))?;

        let mut rows = stmt
            .query(params![key])
            .map_err(|e| format!("Failed to query preference '{}': {}", key, e))?;

        match rows
            .next()
            .map_err(|e| format!("Failed to read preference '{}': {}", key, e))?
        {
            Some(row) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| format!("Failed to decode preference '{}': {}", key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        conn.execute(
            "INSERT INTO prefs (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| format!("Failed to write preference '{}': {}", key, e))?;
        Ok(())
    }
}

/// In-memory store for hosts without persistence and for tests.
#[derive(Default)]
pub struct MemoryPrefStore {
    values: Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryPrefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefStore for MemoryPrefStore {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let values = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut values = self
            .values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SqlitePrefStore::new(&dir.path().join("prefs.db")).unwrap();

        assert_eq!(store.get("language").unwrap(), None);

        store.set("language", "de").unwrap();
        assert_eq!(store.get("language").unwrap(), Some("de".to_string()));

        // Upsert overwrites
        store.set("language", "en").unwrap();
        assert_eq!(store.get("language").unwrap(), Some("en".to_string()));
    }

    #[test]
    fn test_sqlite_store_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("prefs.db");
        let store = SqlitePrefStore::new(&nested).unwrap();
        store.set("mirrored", "true").unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn test_sqlite_store_persists_across_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.db");
        {
            let store = SqlitePrefStore::new(&path).unwrap();
            store.set("provider", "openrouter").unwrap();
        }

        let reopened = SqlitePrefStore::new(&path).unwrap();
        assert_eq!(
            reopened.get("provider").unwrap(),
            Some("openrouter".to_string())
        );
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryPrefStore::new();
        assert_eq!(store.get("x").unwrap(), None);
        store.set("x", "1").unwrap();
        assert_eq!(store.get("x").unwrap(), Some("1".to_string()));
    }
}
