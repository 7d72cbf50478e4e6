use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimited(u64),

    #[error("GitHub token not configured, {0} unavailable")]
    AuthUnavailable(&'static str),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid GitHub handle: {0:?}")]
    InvalidHandle(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Failures of a fetch that the service may cover with a cached value.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::GitHubApi(_)
                | Error::RateLimited(_)
                | Error::Network(_)
                | Error::UserNotFound(_)
                | Error::MalformedResponse(_)
                | Error::Serialization(_)
        )
    }

    pub fn is_cache_io(&self) -> bool {
        matches!(self, Error::Cache(_) | Error::Io(_) | Error::Database(_))
    }
}
