use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::Result;
use crate::github::client::GitHubClient;
use crate::models::{GitHubUser, Organization, PublicEvent, Repository, RepositorySummary};

/// Everything the data service needs from GitHub.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_user(&self, handle: &str) -> Result<GitHubUser>;
    async fn list_user_repos(&self, handle: &str, limit: u32) -> Result<Vec<Repository>>;
    async fn list_user_orgs(&self, handle: &str) -> Result<Vec<Organization>>;
    async fn list_org_repos(&self, org: &str, limit: u32) -> Result<Vec<Repository>>;
    async fn search_issues_count(&self, query: &str) -> Result<u64>;
    async fn search_commits_count(&self, query: &str) -> Result<u64>;
    async fn public_events(&self, handle: &str) -> Result<Vec<PublicEvent>>;

    /// Token-gated; returns `Error::AuthUnavailable` without credentials.
    async fn pinned_repositories(&self, handle: &str, limit: usize) -> Result<Vec<RepositorySummary>>;

    /// Token-gated; returns `Error::AuthUnavailable` without credentials.
    async fn contribution_calendar(&self, handle: &str) -> Result<HashMap<NaiveDate, u32>>;
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_user(&self, handle: &str) -> Result<GitHubUser> {
        GitHubClient::get_user(self, handle).await
    }

    async fn list_user_repos(&self, handle: &str, limit: u32) -> Result<Vec<Repository>> {
        self.get_user_repos(handle, limit).await
    }

    async fn list_user_orgs(&self, handle: &str) -> Result<Vec<Organization>> {
        self.get_user_orgs(handle).await
    }

    async fn list_org_repos(&self, org: &str, limit: u32) -> Result<Vec<Repository>> {
        self.get_org_repos(org, limit).await
    }

    async fn search_issues_count(&self, query: &str) -> Result<u64> {
        GitHubClient::search_issues_count(self, query).await
    }

    async fn search_commits_count(&self, query: &str) -> Result<u64> {
        GitHubClient::search_commits_count(self, query).await
    }

    async fn public_events(&self, handle: &str) -> Result<Vec<PublicEvent>> {
        self.get_public_events(handle).await
    }

    async fn pinned_repositories(&self, handle: &str, limit: usize) -> Result<Vec<RepositorySummary>> {
        self.get_pinned_repositories(handle, limit).await
    }

    async fn contribution_calendar(&self, handle: &str) -> Result<HashMap<NaiveDate, u32>> {
        self.get_contribution_calendar(handle).await
    }
}
