use crate::error::{Error, Result};
use chrono::{Datelike, Utc};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    File,
    Sqlite,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" | "fs" => Ok(CacheBackend::File),
            "sqlite" | "db" => Ok(CacheBackend::Sqlite),
            "memory" | "none" => Ok(CacheBackend::Memory),
            other => Err(Error::Config(format!("Unknown cache backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: Option<String>,
    pub username: String,
    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    pub cache_db_path: PathBuf,
    pub profile_ttl_minutes: u64,
    pub repos_ttl_minutes: u64,
    pub contributions_ttl_minutes: u64,
    pub refresh_interval_minutes: u64,
    pub repo_limit: u32,
    pub pinned_limit: usize,
    pub stats_year: i32,
    pub requests_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let username = env::var("GITHUB_USERNAME").unwrap_or_else(|_| "octocat".to_string());

        let cache_backend = match env::var("CACHE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => CacheBackend::File,
        };

        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".cache/github"));

        let cache_db_path = env::var("CACHE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("gitfolio.db"));

        Ok(Self {
            github_token,
            username,
            cache_backend,
            cache_dir,
            cache_db_path,
            profile_ttl_minutes: parse_var("PROFILE_TTL_MINUTES", 30)?,
            repos_ttl_minutes: parse_var("REPOS_TTL_MINUTES", 24 * 60)?,
            contributions_ttl_minutes: parse_var("CONTRIBUTIONS_TTL_MINUTES", 6 * 60)?,
            refresh_interval_minutes: parse_var("REFRESH_INTERVAL_MINUTES", 30)?,
            repo_limit: parse_var("REPO_LIMIT", 100)?,
            pinned_limit: parse_var("PINNED_LIMIT", 6)?,
            stats_year: parse_var("STATS_YEAR", Utc::now().year())?,
            requests_per_minute: parse_var("REQUESTS_PER_MINUTE", 30)?,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

/// Settings consumed by [`crate::GitHubDataService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_handle: String,
    pub profile_ttl: Duration,
    pub stats_ttl: Duration,
    pub repos_ttl: Duration,
    pub pinned_ttl: Duration,
    pub contributions_ttl: Duration,
    pub refresh_interval: Duration,
    pub repo_limit: u32,
    pub pinned_limit: usize,
    pub stats_year: i32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_handle: "octocat".to_string(),
            profile_ttl: minutes(30),
            stats_ttl: minutes(30),
            repos_ttl: minutes(24 * 60),
            pinned_ttl: minutes(24 * 60),
            contributions_ttl: minutes(6 * 60),
            refresh_interval: minutes(30),
            repo_limit: 100,
            pinned_limit: 6,
            stats_year: Utc::now().year(),
        }
    }
}

impl From<&Config> for ServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_handle: config.username.clone(),
            profile_ttl: minutes(config.profile_ttl_minutes),
            stats_ttl: minutes(config.profile_ttl_minutes),
            repos_ttl: minutes(config.repos_ttl_minutes),
            pinned_ttl: minutes(config.repos_ttl_minutes),
            contributions_ttl: minutes(config.contributions_ttl_minutes),
            refresh_interval: minutes(config.refresh_interval_minutes),
            repo_limit: config.repo_limit,
            pinned_limit: config.pinned_limit,
            stats_year: config.stats_year,
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}
