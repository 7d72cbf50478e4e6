use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Raw repository object from the REST listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u32,
    pub forks_count: u32,
    pub fork: bool,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub owner: RepositoryOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Entry of `GET /users/{handle}/orgs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub login: String,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub is_org_owned: bool,
    pub language: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub is_fork: bool,
    pub pushed_at: Option<DateTime<Utc>>,
    pub url: String,
}

impl From<Repository> for RepositorySummary {
    fn from(repo: Repository) -> Self {
        Self {
            id: repo.id,
            name: repo.name,
            description: repo.description,
            is_org_owned: repo.owner.kind == "Organization",
            owner: repo.owner.login,
            language: repo.language,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            is_fork: repo.fork,
            pushed_at: repo.pushed_at.or(Some(repo.updated_at)),
            url: repo.html_url,
        }
    }
}

/// Drops repeated ids, keeping the first occurrence.
pub fn dedup_by_id(repos: Vec<RepositorySummary>) -> Vec<RepositorySummary> {
    let mut seen = HashSet::new();
    repos.into_iter().filter(|r| seen.insert(r.id)).collect()
}

/// Stable sort, so equal star counts keep listing order.
pub fn sort_by_stars(repos: &mut [RepositorySummary]) {
    repos.sort_by(|a, b| b.stars.cmp(&a.stars));
}

/// Non-fork repositories, most starred first, truncated to `limit`.
pub fn top_non_forks(repos: Vec<RepositorySummary>, limit: usize) -> Vec<RepositorySummary> {
    let mut top: Vec<_> = repos.into_iter().filter(|r| !r.is_fork).collect();
    sort_by_stars(&mut top);
    top.truncate(limit);
    top
}

#[cfg(test)]
pub(crate) fn summary(id: u64, name: &str, stars: u32, is_fork: bool) -> RepositorySummary {
    RepositorySummary {
        id,
        name: name.to_string(),
        description: None,
        owner: "octocat".to_string(),
        is_org_owned: false,
        language: Some("Rust".to_string()),
        stars,
        forks: 0,
        is_fork,
        pushed_at: None,
        url: format!("https://github.com/octocat/{}", name),
    }
}
