use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::Result;
use crate::storage::{CacheEntry, CacheStore};

/// One pretty-printed JSON file per key under a cache directory.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// Keys such as `repos:octocat` become `repos-octocat`.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            ':' => '-',
            _ => '_',
        })
        .collect()
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry<Value>>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn save(&self, key: &str, entry: &CacheEntry<Value>) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(entry)?;

        // Write via temp file so readers never see a partial entry
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json.as_bytes()).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Cached {} at {}", key, path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
