use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

/// Payload plus its capture time in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self::at(data, now_millis())
    }

    pub fn at(data: T, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    /// Fresh iff `now - timestamp < ttl`.
    pub fn is_fresh(&self, ttl: Duration, now: i64) -> bool {
        let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.age_millis(now) < ttl
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }
}

impl<T: Serialize> CacheEntry<T> {
    pub fn to_value(&self) -> Result<CacheEntry<Value>> {
        Ok(CacheEntry::at(serde_json::to_value(&self.data)?, self.timestamp))
    }
}

impl CacheEntry<Value> {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<CacheEntry<T>> {
        Ok(CacheEntry::at(serde_json::from_value(self.data.clone())?, self.timestamp))
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
