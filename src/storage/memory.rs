use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{CacheEntry, CacheStore};

/// Non-persistent store, for tests and runs that should not touch disk.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry<Value>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry<Value>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Cache("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn save(&self, key: &str, entry: &CacheEntry<Value>) -> Result<()> {
        self.entries()?.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries()?.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
