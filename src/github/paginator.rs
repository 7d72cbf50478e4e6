use reqwest::Client;
use serde::de::DeserializeOwned;
use crate::github::client::check_response;
use crate::github::rate_limiter::RateLimiter;
use crate::error::Result;

pub struct Paginator<'a> {
    client: &'a Client,
    rate_limiter: &'a RateLimiter,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a Client, rate_limiter: &'a RateLimiter) -> Self {
        Self {
            client,
            rate_limiter,
        }
    }

    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
    ) -> Result<Vec<T>> {
        self.fetch_limited(base_url, per_page, u32::MAX).await
    }

    /// Follows `rel="next"` links until `max_items` have been collected.
    /// Any failing page fails the whole listing.
    pub async fn fetch_limited<T: DeserializeOwned>(
        &self,
        base_url: &str,
        per_page: u32,
        max_items: u32,
    ) -> Result<Vec<T>> {
        let per_page = per_page.min(max_items).clamp(1, 100);
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            self.rate_limiter.wait().await?;

            let url = page_url(base_url, per_page, page);

            tracing::debug!("Fetching: {}", url);
            let response = self.client.get(&url).send().await?;
            self.rate_limiter.update_from_response(&response);
            let response = check_response(response, &url).await?;

            let has_next = response
                .headers()
                .get("link")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("rel=\"next\""))
                .unwrap_or(false);

            let items: Vec<T> = response.json().await?;
            let items_count = items.len();
            all_items.extend(items);

            if all_items.len() >= max_items as usize || !has_next || items_count < per_page as usize
            {
                break;
            }

            page += 1;
        }

        all_items.truncate(max_items as usize);
        Ok(all_items)
    }
}

fn page_url(base_url: &str, per_page: u32, page: u32) -> String {
    let separator = if base_url.contains('?') { "&" } else { "?" };
    format!("{}{}per_page={}&page={}", base_url, separator, per_page, page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::github::test_server::{respond, TestServer};
    use serde_json::Value;

    fn page_of(path: &str) -> u32 {
        path.split("page=").last().and_then(|p| p.parse().ok()).unwrap_or(0)
    }

    fn items(ids: std::ops::RangeInclusive<u32>) -> String {
        let items: Vec<String> = ids.map(|id| format!(r#"{{"id": {}}}"#, id)).collect();
        format!("[{}]", items.join(","))
    }

    fn next_link(base_url: &str, page: u32) -> (&'static str, String) {
        ("link", format!(r#"<{}/items?page={}>; rel="next""#, base_url, page))
    }

    /// Three pages of two items each, the last without a next link.
    async fn three_pages(failing_page: Option<u32>) -> TestServer {
        TestServer::start(move |path| {
            let page = page_of(path);
            if Some(page) == failing_page {
                return respond(500, &[], r#"{"message": "Server Error"}"#);
            }
            match page {
                1 => respond(200, &[next_link("http://localhost", 2)], &items(1..=2)),
                2 => respond(200, &[next_link("http://localhost", 3)], &items(3..=4)),
                3 => respond(200, &[], &items(5..=6)),
                _ => respond(200, &[], "[]"),
            }
        })
        .await
    }

    fn ids(values: &[Value]) -> Vec<u64> {
        values.iter().filter_map(|v| v["id"].as_u64()).collect()
    }

    #[test]
    fn test_page_url_separator() {
        assert_eq!(
            page_url("https://api.github.com/users/octocat/orgs", 100, 1),
            "https://api.github.com/users/octocat/orgs?per_page=100&page=1"
        );
        assert_eq!(
            page_url("https://api.github.com/orgs/acme/repos?sort=updated", 50, 3),
            "https://api.github.com/orgs/acme/repos?sort=updated&per_page=50&page=3"
        );
    }

    #[tokio::test]
    async fn test_follows_next_links() {
        let server = three_pages(None).await;
        let client = Client::new();
        let limiter = RateLimiter::new(1000);
        let paginator = Paginator::new(&client, &limiter);

        let values: Vec<Value> = paginator.fetch_all(&format!("{}/items", server.base_url), 2).await.unwrap();

        assert_eq!(ids(&values), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(server.requests(), 3);
    }

    #[tokio::test]
    async fn test_stops_at_max_items() {
        let server = three_pages(None).await;
        let client = Client::new();
        let limiter = RateLimiter::new(1000);
        let paginator = Paginator::new(&client, &limiter);

        let values: Vec<Value> =
            paginator.fetch_limited(&format!("{}/items", server.base_url), 2, 3).await.unwrap();

        assert_eq!(ids(&values), vec![1, 2, 3]);
        assert_eq!(server.requests(), 2);
    }

    #[tokio::test]
    async fn test_failing_page_fails_listing() {
        let server = three_pages(Some(2)).await;
        let client = Client::new();
        let limiter = RateLimiter::new(1000);
        let paginator = Paginator::new(&client, &limiter);

        let result: Result<Vec<Value>> = paginator.fetch_all(&format!("{}/items", server.base_url), 2).await;

        match result {
            Err(Error::GitHubApi(msg)) => assert!(msg.starts_with("500 from ")),
            other => panic!("expected GitHubApi, got {:?}", other),
        }
    }
}
