//! SQLite-backed key-value store.
//!
//! Holds the session cache (and anything else keyed by name) in a single
//! `kv` table inside `pomotask.db` in the data directory.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection};

use super::data_dir;
use super::store::{SessionStore, UpdateFn};
use crate::error::{Result, StorageError};

/// How long a writer waits for another connection's transaction to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database used as the durable local store.
///
/// Several stores (in one process or many) may open the same file;
/// [`SessionStore::update`] runs inside an immediate transaction so their
/// read-modify-write cycles never interleave.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `<data dir>/pomotask.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("pomotask.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, StorageError> {
    let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn kv_delete(conn: &Connection, key: &str) -> Result<(), StorageError> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}

fn rewrite(conn: &Connection, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), StorageError> {
    match apply(kv_get(conn, key)?)? {
        Some(value) => kv_set(conn, key, &value),
        None => kv_delete(conn, key),
    }
}

impl SessionStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        kv_get(&*self.lock()?, key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        kv_set(&*self.lock()?, key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        kv_delete(&*self.lock()?, key)
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<(), StorageError> {
        let conn = self.lock()?;
        // IMMEDIATE takes the write lock up front, so a concurrent writer
        // waits here instead of reading a value that is about to change.
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        match rewrite(&conn, key, apply) {
            Ok(()) => {
                if let Err(err) = conn.execute_batch("COMMIT;") {
                    let _ = conn.execute_batch("ROLLBACK;");
                    return Err(err.into());
                }
                Ok(())
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }
}
