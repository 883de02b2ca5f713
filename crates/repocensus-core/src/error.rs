use thiserror::Error;

/// Errors raised by the rate-limited GitHub client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limit still exhausted for {url} after {retries} retries")]
    RateLimitExhausted { url: String, retries: u32 },

    #[error("rate limit reset for {url} is {wait_secs}s away, above the {max_secs}s ceiling")]
    RateLimitWaitTooLong {
        url: String,
        wait_secs: u64,
        max_secs: u64,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("undecodable content from {url}: {reason}")]
    Content { url: String, reason: String },
}

impl ApiError {
    /// HTTP status for [`ApiError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {field}")]
    Missing { field: String },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Terminal errors of a crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("listing page {page} failed: {source}")]
    Listing {
        page: u32,
        #[source]
        source: ApiError,
    },

    #[error("import of {repo} failed: {source}")]
    Import {
        repo: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("worker task failed: {0}")]
    Worker(String),
}
