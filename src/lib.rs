pub mod config;
pub mod error;
pub mod models;
pub mod github;
pub mod storage;
pub mod service;

pub use config::{CacheBackend, Config, ServiceConfig};
pub use error::{Error, Result};
pub use github::{GitHubApi, GitHubClient};
pub use storage::{CacheEntry, CacheStore, FileCacheStore, MemoryCacheStore, SqliteCacheStore};
pub use service::{Fetched, Freshness, GitHubDataService, RefreshReport, ServiceStatus};
