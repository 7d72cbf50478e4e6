use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::storage::{CacheEntry, CacheStore};

/// Cache entries in a single SQLite table.
pub struct SqliteCacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_db()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Runs a blocking closure against the connection off the async executor.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = lock(&shared)?;
            f(&*conn)
        })
        .await
        .map_err(|e| Error::Cache(format!("sqlite task failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::Cache("sqlite connection lock poisoned".to_string()))
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let key = key.to_string();
        let row = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT data, timestamp FROM cache_entries WHERE key = ?1",
                        params![key],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                    )
                    .optional()?)
            })
            .await?;

        match row {
            Some((data, timestamp)) => Ok(Some(CacheEntry::at(serde_json::from_str(&data)?, timestamp))),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, entry: &CacheEntry<Value>) -> Result<()> {
        let key = key.to_string();
        let data = serde_json::to_string(&entry.data)?;
        let timestamp = entry.timestamp;

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO cache_entries (key, data, timestamp)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    data = excluded.data,
                    timestamp = excluded.timestamp
                "#,
                params![key, data, timestamp],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cache_entries", [])?;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
