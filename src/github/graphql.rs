//! Typed GraphQL queries. Responses are decoded into fixed shapes; anything
//! that does not match is reported as [`Error::MalformedResponse`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::RepositorySummary;

pub const PINNED_REPOSITORIES_QUERY: &str = r#"
query PinnedRepositories($login: String!, $first: Int!) {
  user(login: $login) {
    pinnedItems(first: $first, types: REPOSITORY) {
      nodes {
        ... on Repository {
          databaseId
          name
          description
          url
          stargazerCount
          forkCount
          isFork
          updatedAt
          pushedAt
          primaryLanguage { name }
          owner { login __typename }
        }
      }
    }
  }
}
"#;

pub const CONTRIBUTION_CALENDAR_QUERY: &str = r#"
query ContributionCalendar($login: String!) {
  user(login: $login) {
    contributionsCollection {
      contributionCalendar {
        weeks {
          contributionDays { date contributionCount }
        }
      }
    }
  }
}
"#;

/// GitHub caps pinned items at six.
pub const MAX_PINNED: usize = 6;

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct UserData<T> {
    user: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinnedUser {
    pinned_items: NodeList<PinnedRepoNode>,
}

#[derive(Debug, Deserialize)]
struct NodeList<T> {
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinnedRepoNode {
    database_id: u64,
    name: String,
    description: Option<String>,
    url: String,
    stargazer_count: u32,
    fork_count: u32,
    is_fork: bool,
    updated_at: DateTime<Utc>,
    pushed_at: Option<DateTime<Utc>>,
    primary_language: Option<Language>,
    owner: Owner,
}

#[derive(Debug, Deserialize)]
struct Language {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
    #[serde(rename = "__typename")]
    typename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarUser {
    contributions_collection: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: Calendar,
}

#[derive(Debug, Deserialize)]
struct Calendar {
    weeks: Vec<Week>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Week {
    contribution_days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarDay {
    date: NaiveDate,
    contribution_count: u32,
}

impl From<PinnedRepoNode> for RepositorySummary {
    fn from(node: PinnedRepoNode) -> Self {
        Self {
            id: node.database_id,
            name: node.name,
            description: node.description,
            is_org_owned: node.owner.typename == "Organization",
            owner: node.owner.login,
            language: node.primary_language.map(|l| l.name),
            stars: node.stargazer_count,
            forks: node.fork_count,
            is_fork: node.is_fork,
            pushed_at: node.pushed_at.or(Some(node.updated_at)),
            url: node.url,
        }
    }
}

fn decode_user<T: serde::de::DeserializeOwned>(body: &str, login: &str) -> Result<T> {
    let response: GraphQlResponse<UserData<T>> = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("GraphQL response: {}", e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::GitHubApi(format!("GraphQL errors: {}", messages.join("; "))));
    }

    response
        .data
        .and_then(|d| d.user)
        .ok_or_else(|| Error::UserNotFound(login.to_string()))
}

pub fn parse_pinned_response(body: &str, login: &str) -> Result<Vec<RepositorySummary>> {
    let user: PinnedUser = decode_user(body, login)?;
    Ok(user
        .pinned_items
        .nodes
        .into_iter()
        .take(MAX_PINNED)
        .map(RepositorySummary::from)
        .collect())
}

pub fn parse_calendar_response(body: &str, login: &str) -> Result<HashMap<NaiveDate, u32>> {
    let user: CalendarUser = decode_user(body, login)?;
    Ok(user
        .contributions_collection
        .contribution_calendar
        .weeks
        .into_iter()
        .flat_map(|w| w.contribution_days)
        .map(|d| (d.date, d.contribution_count))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PINNED_BODY: &str = r#"{
        "data": {
            "user": {
                "pinnedItems": {
                    "nodes": [
                        {
                            "databaseId": 1296269,
                            "name": "Hello-World",
                            "description": "My first repository",
                            "url": "https://github.com/octocat/Hello-World",
                            "stargazerCount": 2500,
                            "forkCount": 2000,
                            "isFork": false,
                            "updatedAt": "2024-01-01T00:00:00Z",
                            "pushedAt": null,
                            "primaryLanguage": null,
                            "owner": { "login": "octocat", "__typename": "User" }
                        },
                        {
                            "databaseId": 42,
                            "name": "docs",
                            "description": null,
                            "url": "https://github.com/github/docs",
                            "stargazerCount": 15000,
                            "forkCount": 50000,
                            "isFork": false,
                            "updatedAt": "2024-01-01T00:00:00Z",
                            "pushedAt": "2024-02-01T00:00:00Z",
                            "primaryLanguage": { "name": "JavaScript" },
                            "owner": { "login": "github", "__typename": "Organization" }
                        }
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_pinned() {
        let repos = parse_pinned_response(PINNED_BODY, "octocat").unwrap();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].id, 1296269);
        assert!(!repos[0].is_org_owned);
        assert_eq!(repos[1].language.as_deref(), Some("JavaScript"));
        assert!(repos[1].is_org_owned);
    }

    #[test]
    fn test_pinned_schema_mismatch_fails_closed() {
        let body = r#"{"data": {"user": {"pinnedItems": {"nodes": [{"name": "x"}]}}}}"#;
        let err = parse_pinned_response(body, "octocat").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_graphql_errors_are_reported() {
        let body = r#"{"data": null, "errors": [{"message": "Bad credentials"}]}"#;
        let err = parse_pinned_response(body, "octocat").unwrap_err();
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[test]
    fn test_missing_user() {
        let body = r#"{"data": {"user": null}}"#;
        let err = parse_pinned_response(body, "ghost").unwrap_err();
        assert!(matches!(err, Error::UserNotFound(_)));
    }

    #[test]
    fn test_parse_calendar() {
        let body = r#"{
            "data": {
                "user": {
                    "contributionsCollection": {
                        "contributionCalendar": {
                            "weeks": [
                                { "contributionDays": [
                                    { "date": "2024-01-07", "contributionCount": 0 },
                                    { "date": "2024-01-08", "contributionCount": 4 }
                                ] },
                                { "contributionDays": [
                                    { "date": "2024-01-14", "contributionCount": 2 }
                                ] }
                            ]
                        }
                    }
                }
            }
        }"#;

        let counts = parse_calendar_response(body, "octocat").unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts[&NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()], 4);
    }
}
