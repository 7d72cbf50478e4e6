use chrono::Utc;
use futures::future::try_join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::github::GitHubApi;
use crate::models::{
    daily_counts, dedup_by_id, sort_by_stars, top_non_forks, ContributionCalendar,
    ContributionSource, ExtendedProfileStats, RepositorySummary, UserProfile,
};
use crate::service::refresh::RefreshTask;
use crate::service::{Fetched, Freshness, ServiceStatus};
use crate::storage::{now_millis, CacheEntry, CacheStore};

/// Single point of access for GitHub-derived data.
///
/// Each dataset is cached per handle under its own key with its own TTL. A
/// read returns a fresh entry without touching the network; otherwise it
/// fetches, and when the fetch fails it serves whatever entry exists, stale
/// or not, flagged with the error. Only when no entry exists does the error
/// reach the caller.
pub struct GitHubDataService {
    api: Arc<dyn GitHubApi>,
    store: Arc<dyn CacheStore>,
    pub(crate) config: ServiceConfig,
    memory: RwLock<HashMap<String, CacheEntry<Value>>>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    in_flight: AtomicUsize,
    status: Mutex<ServiceStatus>,
    pub(crate) refresher: Mutex<Option<RefreshTask>>,
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) mod keys {
    pub fn profile(handle: &str) -> String {
        format!("profile:{}", handle)
    }

    pub fn stats(handle: &str) -> String {
        format!("stats:{}", handle)
    }

    pub fn repos(handle: &str) -> String {
        format!("repos:{}", handle)
    }

    pub fn pinned(handle: &str, limit: usize) -> String {
        format!("pinned:{}:{}", handle, limit)
    }

    pub fn contributions(handle: &str) -> String {
        format!("contributions:{}", handle)
    }
}

impl GitHubDataService {
    pub fn new(api: Arc<dyn GitHubApi>, store: Arc<dyn CacheStore>, config: ServiceConfig) -> Self {
        Self {
            api,
            store,
            config,
            memory: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            status: Mutex::new(ServiceStatus::default()),
            refresher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn default_handle(&self) -> &str {
        &self.config.default_handle
    }

    pub fn status(&self) -> ServiceStatus {
        let mut status = self.status.lock().map(|s| s.clone()).unwrap_or_default();
        status.loading = self.in_flight.load(Ordering::SeqCst) > 0;
        status
    }

    pub async fn get_profile(&self, handle: &str) -> Result<Fetched<UserProfile>> {
        let handle = normalize(handle)?;
        self.cached(keys::profile(&handle), self.config.profile_ttl, false, || self.fetch_profile(&handle))
            .await
    }

    pub async fn get_profile_stats(&self, handle: &str) -> Result<Fetched<ExtendedProfileStats>> {
        let handle = normalize(handle)?;
        self.stats(&handle, false).await
    }

    pub async fn get_repositories(&self, handle: &str) -> Result<Fetched<Vec<RepositorySummary>>> {
        let handle = normalize(handle)?;
        self.repositories(&handle, false).await
    }

    pub async fn get_contributions(&self, handle: &str) -> Result<Fetched<ContributionCalendar>> {
        let handle = normalize(handle)?;
        self.contributions(&handle, false).await
    }

    pub async fn get_pinned_or_top_repositories(
        &self,
        handle: &str,
        limit: usize,
    ) -> Result<Fetched<Vec<RepositorySummary>>> {
        let handle = normalize(handle)?;
        self.pinned(&handle, limit, false).await
    }

    pub(crate) async fn stats(&self, handle: &str, force: bool) -> Result<Fetched<ExtendedProfileStats>> {
        let fetched = self
            .cached(keys::stats(handle), self.config.stats_ttl, force, || self.fetch_stats(handle))
            .await?;

        if fetched.freshness == Freshness::Fresh {
            let entry = CacheEntry::at(&fetched.data.profile, fetched.fetched_at.timestamp_millis());
            self.commit(&keys::profile(handle), &entry).await;
        }
        Ok(fetched)
    }

    pub(crate) async fn repositories(&self, handle: &str, force: bool) -> Result<Fetched<Vec<RepositorySummary>>> {
        self.cached(keys::repos(handle), self.config.repos_ttl, force, || self.fetch_repositories(handle))
            .await
    }

    pub(crate) async fn contributions(&self, handle: &str, force: bool) -> Result<Fetched<ContributionCalendar>> {
        self.cached(keys::contributions(handle), self.config.contributions_ttl, force, || {
            self.fetch_contributions(handle)
        })
        .await
    }

    pub(crate) async fn pinned(
        &self,
        handle: &str,
        limit: usize,
        force: bool,
    ) -> Result<Fetched<Vec<RepositorySummary>>> {
        self.cached(keys::pinned(handle, limit), self.config.pinned_ttl, force, || {
            self.fetch_pinned(handle, limit)
        })
        .await
    }

    async fn fetch_profile(&self, handle: &str) -> Result<UserProfile> {
        Ok(UserProfile::from(self.api.get_user(handle).await?))
    }

    /// Profile plus search-derived counters. All five requests must succeed
    /// before anything is assembled.
    async fn fetch_stats(&self, handle: &str) -> Result<ExtendedProfileStats> {
        let year = self.config.stats_year;
        let pr_query = format!("author:{} type:pr", handle);
        let issue_query = format!("author:{} type:issue", handle);
        let commit_query = format!("author:{}", handle);
        let year_query = format!("author:{} author-date:{}-01-01..{}-12-31", handle, year, year);

        tracing::info!("Fetching profile stats for: {}", handle);
        let (user, total_pull_requests, total_issues, total_commits, commits_in_year) = tokio::try_join!(
            self.api.get_user(handle),
            self.api.search_issues_count(&pr_query),
            self.api.search_issues_count(&issue_query),
            self.api.search_commits_count(&commit_query),
            self.api.search_commits_count(&year_query),
        )?;

        Ok(ExtendedProfileStats {
            profile: UserProfile::from(user),
            total_pull_requests,
            total_commits,
            commit_year: year,
            commits_in_year,
            total_issues,
        })
    }

    /// Personal repositories plus those of every organization the user
    /// belongs to. One failing organization fails the whole aggregate.
    async fn fetch_repositories(&self, handle: &str) -> Result<Vec<RepositorySummary>> {
        let limit = self.config.repo_limit;
        let (personal, orgs) = tokio::try_join!(
            self.api.list_user_repos(handle, limit),
            self.api.list_user_orgs(handle),
        )?;

        let org_repos = try_join_all(orgs.iter().map(|org| self.api.list_org_repos(&org.login, limit))).await?;

        let combined: Vec<RepositorySummary> = personal
            .into_iter()
            .chain(org_repos.into_iter().flatten())
            .map(RepositorySummary::from)
            .collect();

        let mut repos = dedup_by_id(combined);
        sort_by_stars(&mut repos);

        tracing::info!(
            "Aggregated {} repositories for {} across {} organizations",
            repos.len(),
            handle,
            orgs.len()
        );
        Ok(repos)
    }

    async fn fetch_contributions(&self, handle: &str) -> Result<ContributionCalendar> {
        let today = Utc::now().date_naive();

        match self.api.contribution_calendar(handle).await {
            Ok(counts) => return Ok(ContributionCalendar::new(today, &counts, ContributionSource::Calendar)),
            Err(Error::AuthUnavailable(_)) => {
                tracing::debug!("No token, estimating contributions for {} from public events", handle)
            }
            Err(e) => tracing::warn!("Contribution calendar unavailable for {}, estimating: {}", handle, e),
        }

        let events = self.api.public_events(handle).await?;
        Ok(ContributionCalendar::new(today, &daily_counts(&events), ContributionSource::PublicEvents))
    }

    /// Pinned repositories when GraphQL is available, otherwise the most
    /// starred non-fork repositories. GraphQL failures never surface.
    async fn fetch_pinned(&self, handle: &str, limit: usize) -> Result<Vec<RepositorySummary>> {
        match self.api.pinned_repositories(handle, limit).await {
            Ok(mut pinned) if !pinned.is_empty() => {
                pinned.truncate(limit);
                return Ok(pinned);
            }
            Ok(_) => tracing::debug!("{} has no pinned repositories, using top repositories", handle),
            Err(Error::AuthUnavailable(_)) => tracing::debug!("No token, using top repositories for {}", handle),
            Err(e) => tracing::warn!("Pinned repositories query failed for {}, using top repositories: {}", handle, e),
        }

        let repos = self.api.list_user_repos(handle, self.config.repo_limit).await?;
        Ok(top_non_forks(repos.into_iter().map(RepositorySummary::from).collect(), limit))
    }

    /// Cache-or-fetch for one key. Fetches of the same key are serialized;
    /// a caller that waited on another's fetch reuses its result.
    async fn cached<T, F, Fut>(&self, key: String, ttl: Duration, force: bool, fetch: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !force {
            if let Some(hit) = self.memory_hit(&key, ttl) {
                return Ok(hit);
            }
        }

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let existing = self.lookup(&key).await;
        if !force {
            if let Some(hit) = existing.as_ref().and_then(|e| fresh_hit(&key, e, ttl)) {
                return Ok(hit);
            }
        }

        let _loading = LoadingGuard::new(&self.in_flight);
        match fetch().await {
            Ok(data) => {
                let entry = CacheEntry::new(data);
                self.commit(&key, &entry).await;
                self.record_success(&key);
                Ok(Fetched {
                    fetched_at: entry.captured_at(),
                    data: entry.data,
                    freshness: Freshness::Fresh,
                    error: None,
                })
            }
            Err(e) => {
                self.record_failure(&key, &e);
                let Some(entry) = existing.and_then(|cached| decode_entry::<T>(&key, &cached)) else {
                    tracing::warn!("Fetch of {} failed with nothing cached: {}", key, e);
                    return Err(e);
                };

                tracing::warn!("Fetch of {} failed, serving cached copy: {}", key, e);
                let freshness = if entry.is_fresh(ttl, now_millis()) {
                    Freshness::Cached
                } else {
                    Freshness::Stale
                };
                Ok(Fetched {
                    fetched_at: entry.captured_at(),
                    data: entry.data,
                    freshness,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    fn memory_hit<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<Fetched<T>> {
        let memory = self.memory.read().ok()?;
        fresh_hit(key, memory.get(key)?, ttl)
    }

    /// In-memory entry, or the persisted one on first access. Store failures
    /// are logged and treated as a miss.
    async fn lookup(&self, key: &str) -> Option<CacheEntry<Value>> {
        if let Some(entry) = self.memory.read().ok().and_then(|m| m.get(key).cloned()) {
            return Some(entry);
        }

        match self.store.load(key).await {
            Ok(Some(entry)) => {
                if let Ok(mut memory) = self.memory.write() {
                    memory.insert(key.to_string(), entry.clone());
                }
                Some(entry)
            }
            Ok(None) => None,
            Err(e) if e.is_cache_io() => {
                tracing::warn!("Could not read {} from {} cache: {}", key, self.store.name(), e);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable {} entry in {} cache: {}", key, self.store.name(), e);
                None
            }
        }
    }

    /// Replaces the entry in memory, then persists it. Persistence failures
    /// are logged; the in-memory entry still serves readers.
    async fn commit<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) {
        let entry = match entry.to_value() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Could not encode {} for caching: {}", key, e);
                return;
            }
        };

        if let Ok(mut memory) = self.memory.write() {
            memory.insert(key.to_string(), entry.clone());
        }

        if let Err(e) = self.store.save(key, &entry).await {
            tracing::warn!("Could not persist {} to {} cache: {}", key, self.store.name(), e);
        }
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.key_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    fn record_success(&self, key: &str) {
        if let Ok(mut status) = self.status.lock() {
            status.errors.remove(key);
            status.last_refreshed = Some(Utc::now());
        }
    }

    fn record_failure(&self, key: &str, error: &Error) {
        if let Ok(mut status) = self.status.lock() {
            status.errors.insert(key.to_string(), error.to_string());
        }
    }

    /// Drops every cached entry, in memory and persisted, along with the
    /// per-key locks nobody is holding.
    pub async fn clear_cache(&self) -> Result<()> {
        if let Ok(mut memory) = self.memory.write() {
            memory.clear();
        }
        if let Ok(mut locks) = self.key_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        self.store.clear().await
    }

    /// Stops auto-refresh and waits for the background task to exit.
    pub async fn dispose(&self) {
        if let Some(task) = self.take_refresh_task() {
            task.shutdown().await;
        }
    }
}

pub(crate) fn normalize(handle: &str) -> Result<String> {
    let handle = handle.trim();
    if handle.is_empty() {
        return Err(Error::InvalidHandle(handle.to_string()));
    }
    Ok(handle.to_lowercase())
}

fn decode_entry<T: DeserializeOwned>(key: &str, entry: &CacheEntry<Value>) -> Option<CacheEntry<T>> {
    match entry.decode() {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e);
            None
        }
    }
}

fn fresh_hit<T: DeserializeOwned>(key: &str, entry: &CacheEntry<Value>, ttl: Duration) -> Option<Fetched<T>> {
    if !entry.is_fresh(ttl, now_millis()) {
        return None;
    }
    let entry = decode_entry::<T>(key, entry)?;
    tracing::debug!("Cache hit: {}", key);
    Some(Fetched {
        fetched_at: entry.captured_at(),
        data: entry.data,
        freshness: Freshness::Cached,
        error: None,
    })
}
