//! SQLite-backed key-value storage for guest mode.
//!
//! The guest backend only needs string-keyed slots holding JSON snapshots,
//! so the schema is a single `kv` table.

use std::path::Path;

use rusqlite::{params, Connection};

use super::{data_dir, SlotStorage};
use crate::error::StoreError;

/// SQLite database for on-device slots.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/heroic-tasks/heroic-tasks.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(&data_dir()?.join("heroic-tasks.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SlotStorage for Database {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.kv_get(key)?)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(self.kv_set(key, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.read_slot("test").unwrap().as_deref(), Some("again"));
    }

    #[test]
    fn slots_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("guest.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.write_slot("heroicTasks_guestProfile", r#"{"xp":5,"level":2}"#)
                .unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.read_slot("heroicTasks_guestProfile").unwrap().as_deref(),
            Some(r#"{"xp":5,"level":2}"#)
        );
    }
}
