//! In-process stand-in for the GitHub API used by the service tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::github::GitHubApi;
use crate::models::{
    EventPayload, GitHubUser, Organization, PublicEvent, Repository, RepositoryOwner,
    RepositorySummary,
};
use crate::storage::{CacheEntry, CacheStore};
use serde_json::Value;

pub(crate) fn repo(id: u64, name: &str, owner: &str, stars: u32, fork: bool) -> Repository {
    let kind = if owner == "octocat" { "User" } else { "Organization" };
    Repository {
        id,
        name: name.to_string(),
        description: None,
        language: Some("Rust".to_string()),
        stargazers_count: stars,
        forks_count: 0,
        fork,
        html_url: format!("https://github.com/{}/{}", owner, name),
        updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        pushed_at: None,
        owner: RepositoryOwner {
            login: owner.to_string(),
            kind: kind.to_string(),
        },
    }
}

pub(crate) struct FakeGitHub {
    pub user: GitHubUser,
    pub user_repos: Vec<Repository>,
    orgs: Mutex<Vec<(String, Option<Vec<Repository>>)>>,
    token: bool,
    failing: AtomicBool,
    search_failing: AtomicBool,
    graphql_failing: AtomicBool,
    user_delay: Mutex<Option<Duration>>,
    user_calls: AtomicUsize,
    user_repo_calls: AtomicUsize,
    event_calls: AtomicUsize,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            user: GitHubUser {
                login: "octocat".to_string(),
                id: 583231,
                name: Some("The Octocat".to_string()),
                avatar_url: "https://avatars.githubusercontent.com/u/583231".to_string(),
                html_url: "https://github.com/octocat".to_string(),
                bio: None,
                company: Some("@github".to_string()),
                location: Some("San Francisco".to_string()),
                public_repos: 5,
                followers: 9000,
                following: 9,
                created_at: Utc.with_ymd_and_hms(2011, 1, 25, 18, 44, 36).unwrap(),
            },
            user_repos: vec![
                repo(1, "popular", "octocat", 1000, false),
                repo(2, "forked", "octocat", 500, true),
                repo(3, "side", "octocat", 50, false),
                repo(4, "tiny", "octocat", 1, false),
                repo(5, "old", "octocat", 0, false),
            ],
            orgs: Mutex::new(Vec::new()),
            token: false,
            failing: AtomicBool::new(false),
            search_failing: AtomicBool::new(false),
            graphql_failing: AtomicBool::new(false),
            user_delay: Mutex::new(None),
            user_calls: AtomicUsize::new(0),
            user_repo_calls: AtomicUsize::new(0),
            event_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_token(mut self) -> Self {
        self.token = true;
        self
    }

    pub fn add_org(&self, login: &str, repos: Vec<Repository>) {
        self.orgs.lock().unwrap().push((login.to_string(), Some(repos)));
    }

    pub fn add_failing_org(&self, login: &str) {
        self.orgs.lock().unwrap().push((login.to_string(), None));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_search_failing(&self, failing: bool) {
        self.search_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_graphql_failing(&self, failing: bool) {
        self.graphql_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_user_delay(&self, delay: Duration) {
        *self.user_delay.lock().unwrap() = Some(delay);
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn user_repo_calls(&self) -> usize {
        self.user_repo_calls.load(Ordering::SeqCst)
    }

    pub fn event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::GitHubApi("503 from fake - unavailable".to_string()));
        }
        Ok(())
    }

    fn check_graphql(&self) -> Result<()> {
        if !self.token {
            return Err(Error::AuthUnavailable("GraphQL"));
        }
        if self.graphql_failing.load(Ordering::SeqCst) {
            return Err(Error::MalformedResponse("unexpected GraphQL shape".to_string()));
        }
        self.check()
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_user(&self, _handle: &str) -> Result<GitHubUser> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.user_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(self.user.clone())
    }

    async fn list_user_repos(&self, _handle: &str, limit: u32) -> Result<Vec<Repository>> {
        self.user_repo_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.user_repos.iter().take(limit as usize).cloned().collect())
    }

    async fn list_user_orgs(&self, _handle: &str) -> Result<Vec<Organization>> {
        self.check()?;
        let orgs = self.orgs.lock().unwrap();
        Ok(orgs
            .iter()
            .enumerate()
            .map(|(i, (login, _))| Organization { login: login.clone(), id: i as u64 + 100 })
            .collect())
    }

    async fn list_org_repos(&self, org: &str, limit: u32) -> Result<Vec<Repository>> {
        self.check()?;
        let orgs = self.orgs.lock().unwrap();
        match orgs.iter().find(|(login, _)| login == org) {
            Some((_, Some(repos))) => Ok(repos.iter().take(limit as usize).cloned().collect()),
            _ => Err(Error::GitHubApi(format!("404 from fake - no org {}", org))),
        }
    }

    async fn search_issues_count(&self, query: &str) -> Result<u64> {
        self.check()?;
        if self.search_failing.load(Ordering::SeqCst) {
            return Err(Error::RateLimited(60));
        }
        Ok(if query.contains("type:pr") { 12 } else { 5 })
    }

    async fn search_commits_count(&self, query: &str) -> Result<u64> {
        self.check()?;
        if self.search_failing.load(Ordering::SeqCst) {
            return Err(Error::RateLimited(60));
        }
        Ok(if query.contains("author-date:") { 80 } else { 340 })
    }

    async fn public_events(&self, _handle: &str) -> Result<Vec<PublicEvent>> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let now = Utc::now();
        Ok(vec![
            PublicEvent {
                kind: "PushEvent".to_string(),
                created_at: now - ChronoDuration::days(1),
                payload: EventPayload { size: Some(2), ..Default::default() },
            },
            PublicEvent {
                kind: "IssuesEvent".to_string(),
                created_at: now - ChronoDuration::days(3),
                payload: EventPayload { action: Some("opened".to_string()), ..Default::default() },
            },
            PublicEvent {
                kind: "WatchEvent".to_string(),
                created_at: now - ChronoDuration::days(3),
                payload: EventPayload::default(),
            },
        ])
    }

    async fn pinned_repositories(&self, _handle: &str, limit: usize) -> Result<Vec<RepositorySummary>> {
        self.check_graphql()?;
        let pinned = RepositorySummary::from(repo(99, "pinned-project", "octocat", 7, false));
        Ok(vec![pinned].into_iter().take(limit).collect())
    }

    async fn contribution_calendar(&self, _handle: &str) -> Result<HashMap<NaiveDate, u32>> {
        self.check_graphql()?;
        let today = Utc::now().date_naive();
        let mut counts = HashMap::new();
        counts.insert(today, 9);
        counts.insert(today - ChronoDuration::days(400), 5);
        Ok(counts)
    }
}

/// Cache backend whose every operation fails, as a full disk or a revoked
/// directory would.
pub(crate) struct FailingStore {
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self { loads: AtomicUsize::new(0), saves: AtomicUsize::new(0) }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for FailingStore {
    async fn load(&self, _key: &str) -> Result<Option<CacheEntry<Value>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Err(Error::Cache("disk unavailable".to_string()))
    }

    async fn save(&self, _key: &str, _entry: &CacheEntry<Value>) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(Error::Cache("disk unavailable".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::Cache("disk unavailable".to_string()))
    }

    async fn clear(&self) -> Result<()> {
        Err(Error::Cache("disk unavailable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
