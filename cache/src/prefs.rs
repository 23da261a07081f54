use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::CacheError;

/// Durable per-key byte storage shared by the session and the photo cache.
pub trait Prefs: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Writes several keys. Implementations may make this atomic.
    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Makes previous writes durable.
    fn flush(&self) -> Result<(), CacheError>;
}

fn apply_migrations(conn: &mut Connection) -> Result<(), CacheError> {
    let migrations = Migrations::new(vec![M::up(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\
         INSERT INTO schema_version (version) VALUES (1);\
         CREATE TABLE IF NOT EXISTS prefs (\
             key TEXT PRIMARY KEY,\
             value BLOB NOT NULL\
         );",
    )]);
    migrations
        .to_latest(conn)
        .map_err(|e| CacheError::DatabaseError(format!("Failed to apply migrations: {}", e)))?;
    Ok(())
}

/// SQLite-backed [`Prefs`]. Every write is committed when it returns.
#[derive(Clone)]
pub struct SqlitePrefs {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePrefs {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)
            .map_err(|e| CacheError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, CacheError> {
        apply_migrations(&mut conn)?;
        Ok(SqlitePrefs { conn: Arc::new(Mutex::new(conn)) })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Other("Poisoned lock".into()))
    }
}

impl Prefs for SqlitePrefs {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.lock_conn()?;
        conn.query_row("SELECT value FROM prefs WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to read {}: {}", key, e)))
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, value)))]
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO prefs (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| CacheError::DatabaseError(format!("Failed to write {}: {}", key, e)))?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM prefs WHERE key = ?1", params![key])
            .map_err(|e| CacheError::DatabaseError(format!("Failed to delete {}: {}", key, e)))?;
        Ok(())
    }

    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self, entries), fields(count = entries.len())))]
    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<(), CacheError> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO prefs (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| CacheError::DatabaseError(format!("Failed to write {}: {}", key, e)))?;
        }
        tx.commit()
            .map_err(|e| CacheError::DatabaseError(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Process-local [`Prefs`]; nothing survives the process.
#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, CacheError> {
        self.values
            .lock()
            .map_err(|_| CacheError::Other("Poisoned lock".into()))
    }
}

impl Prefs for MemoryPrefs {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
