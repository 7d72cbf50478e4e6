pub mod data_service;
pub mod refresh;

#[cfg(test)]
pub(crate) mod fake;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use data_service::GitHubDataService;
pub use refresh::RefreshReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched from GitHub by this call.
    Fresh,
    /// Served from a cache entry still inside its TTL.
    Cached,
    /// Served from an expired cache entry because the fetch failed.
    Stale,
}

/// A payload as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
    pub freshness: Freshness,
    /// Set when the fetch failed and a cached value was served instead.
    pub error: Option<String>,
}

impl<T> Fetched<T> {
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

/// Loading and error indicators for UI binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub loading: bool,
    /// Last failure per cache key, cleared when that key fetches successfully.
    pub errors: BTreeMap<String, String>,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    pub fn error(&self) -> Option<&str> {
        self.errors.values().next().map(String::as_str)
    }
}
