//! Persistent key-value stores for cached GitHub data.
//!
//! Every backend persists the same envelope, [`CacheEntry`], holding a JSON
//! payload and the epoch-millisecond time it was captured.

pub mod entry;
pub mod file;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use entry::{now_millis, CacheEntry};
pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry<Value>>>;
    async fn save(&self, key: &str, entry: &CacheEntry<Value>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
    fn name(&self) -> &str;
}
