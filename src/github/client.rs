use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::github::graphql::{self, GraphQlRequest};
use crate::github::paginator::Paginator;
use crate::github::rate_limiter::{unix_now, RateLimiter};
use crate::models::{GitHubUser, Organization, PublicEvent, Repository, RepositorySummary, SearchResult};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// The public event feed stops after 300 events.
const MAX_PUBLIC_EVENTS: u32 = 300;

pub struct GitHubClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    authenticated: bool,
}

impl GitHubClient {
    /// Builds a client; without a token requests are anonymous and GraphQL is unavailable.
    pub fn new(token: Option<&str>, requests_per_minute: u32) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("gitfolio/0.1"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(requests_per_minute),
            base_url: GITHUB_API_BASE.to_string(),
            authenticated: token.is_some(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.rate_limiter.wait().await?;
        tracing::debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;
        self.rate_limiter.update_from_response(&response);
        if let Some(remaining) = self.rate_limiter.remaining() {
            tracing::debug!("GitHub budget: {} requests left", remaining);
        }
        let response = check_response(response, url).await?;

        response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", url, e)))
    }

    pub async fn get_user(&self, username: &str) -> Result<GitHubUser> {
        let url = format!("{}/users/{}", self.base_url, username);
        tracing::info!("Fetching user: {}", username);

        match self.get_json(&url).await {
            Err(Error::GitHubApi(msg)) if msg.starts_with("404") => {
                Err(Error::UserNotFound(username.to_string()))
            }
            other => other,
        }
    }

    pub async fn get_user_repos(&self, username: &str, limit: u32) -> Result<Vec<Repository>> {
        let url = format!("{}/users/{}/repos?type=owner&sort=updated", self.base_url, username);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::info!("Fetching repositories for: {}", username);
        paginator.fetch_limited(&url, 100, limit).await
    }

    pub async fn get_user_orgs(&self, username: &str) -> Result<Vec<Organization>> {
        let url = format!("{}/users/{}/orgs", self.base_url, username);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::info!("Fetching organizations for: {}", username);
        paginator.fetch_all(&url, 100).await
    }

    pub async fn get_org_repos(&self, org: &str, limit: u32) -> Result<Vec<Repository>> {
        let url = format!("{}/orgs/{}/repos?sort=updated", self.base_url, org);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::info!("Fetching repositories for organization: {}", org);
        paginator.fetch_limited(&url, 100, limit).await
    }

    /// `total_count` of an issue search such as `author:octocat type:pr`.
    pub async fn search_issues_count(&self, query: &str) -> Result<u64> {
        let url = format!("{}/search/issues?q={}&per_page=1", self.base_url, encode_query(query));
        let result: SearchResult = self.get_json(&url).await?;
        Ok(result.total_count)
    }

    pub async fn search_commits_count(&self, query: &str) -> Result<u64> {
        let url = format!("{}/search/commits?q={}&per_page=1", self.base_url, encode_query(query));
        let result: SearchResult = self.get_json(&url).await?;
        Ok(result.total_count)
    }

    pub async fn get_public_events(&self, username: &str) -> Result<Vec<PublicEvent>> {
        let url = format!("{}/users/{}/events/public", self.base_url, username);
        let paginator = Paginator::new(&self.client, &self.rate_limiter);
        tracing::info!("Fetching public events for: {}", username);
        paginator.fetch_limited(&url, 100, MAX_PUBLIC_EVENTS).await
    }

    async fn graphql<V: Serialize>(&self, query: &str, variables: V) -> Result<String> {
        if !self.authenticated {
            return Err(Error::AuthUnavailable("GraphQL"));
        }

        self.rate_limiter.wait().await?;
        let url = format!("{}/graphql", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?;
        self.rate_limiter.update_from_response(&response);
        let response = check_response(response, &url).await?;

        Ok(response.text().await?)
    }

    pub async fn get_pinned_repositories(&self, username: &str, limit: usize) -> Result<Vec<RepositorySummary>> {
        tracing::info!("Fetching pinned repositories for: {}", username);
        let first = limit.min(graphql::MAX_PINNED);
        let body = self
            .graphql(
                graphql::PINNED_REPOSITORIES_QUERY,
                serde_json::json!({ "login": username, "first": first }),
            )
            .await?;
        graphql::parse_pinned_response(&body, username)
    }

    pub async fn get_contribution_calendar(&self, username: &str) -> Result<HashMap<NaiveDate, u32>> {
        tracing::info!("Fetching contribution calendar for: {}", username);
        let body = self
            .graphql(
                graphql::CONTRIBUTION_CALENDAR_QUERY,
                serde_json::json!({ "login": username }),
            )
            .await?;
        graphql::parse_calendar_response(&body, username)
    }
}

/// Maps non-success statuses onto crate errors. An exhausted budget on 403/429
/// becomes [`Error::RateLimited`].
pub(crate) async fn check_response(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let headers = response.headers();
        let exhausted = headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(status == StatusCode::TOO_MANY_REQUESTS);

        if exhausted {
            let retry_after = headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .or_else(|| {
                    headers
                        .get("x-ratelimit-reset")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(|reset| reset.saturating_sub(unix_now()))
                })
                .unwrap_or(60);
            return Err(Error::RateLimited(retry_after));
        }
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::GitHubApi(format!("{} from {} - {}", status.as_u16(), url, body)))
}

/// Encodes a search query for the `q` parameter; spaces become `+`.
fn encode_query(query: &str) -> String {
    let mut encoded = String::with_capacity(query.len());
    for byte in query.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
