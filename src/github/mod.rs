pub mod api;
pub mod client;
pub mod graphql;
pub mod rate_limiter;
pub mod paginator;

#[cfg(test)]
pub(crate) mod test_server;

pub use api::GitHubApi;
pub use client::GitHubClient;
pub use rate_limiter::RateLimiter;
pub use paginator::Paginator;
