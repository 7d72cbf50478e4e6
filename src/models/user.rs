use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw `GET /users/{handle}` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub avatar_url: String,
    pub html_url: String,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub public_repos: u32,
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    pub created_at: DateTime<Utc>,
}

/// Public snapshot of the account owner's GitHub profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub handle: String,
    pub name: Option<String>,
    pub avatar_url: String,
    pub profile_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub created_at: DateTime<Utc>,
}

impl From<GitHubUser> for UserProfile {
    fn from(user: GitHubUser) -> Self {
        Self {
            handle: user.login,
            name: user.name,
            avatar_url: user.avatar_url,
            profile_url: user.html_url,
            bio: user.bio,
            location: user.location,
            company: user.company,
            public_repos: user.public_repos,
            followers: user.followers,
            following: user.following,
            created_at: user.created_at,
        }
    }
}

/// A profile plus counters derived from the search API in the same fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProfileStats {
    pub profile: UserProfile,
    pub total_pull_requests: u64,
    pub total_commits: u64,
    pub commit_year: i32,
    pub commits_in_year: u64,
    pub total_issues: u64,
}
