use crate::config::CrawlConfig;
use crate::error::ApiError;
use crate::providers::auth::Credentials;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";

/// Running total of HTTP attempts made during one run, retries included.
#[derive(Debug, Default)]
pub struct ApiCallCounter(AtomicU64);

impl ApiCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call and return the new total.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
enum Bearer<'a> {
    Configured,
    Explicit(&'a str),
}

/// Authenticated GitHub client that sleeps through rate-limit exhaustion.
pub struct RateLimitedClient {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
    counter: Arc<ApiCallCounter>,
    cancel: CancellationToken,
    max_retries: u32,
    max_wait: Duration,
}

impl RateLimitedClient {
    /// Create a client from run configuration. `cancel` aborts pending requests and sleeps.
    pub fn from_config(
        config: &CrawlConfig,
        counter: Arc<ApiCallCounter>,
        cancel: CancellationToken,
    ) -> Result<Self, ApiError> {
        let credentials = Credentials::from_config(config)?;
        let mut client = Self::new(&config.api_base_url, credentials, counter, cancel, config.request_timeout())?;
        client.max_retries = config.max_rate_limit_retries;
        client.max_wait = config.max_rate_limit_wait();
        Ok(client)
    }

    pub fn new(
        base_url: &str,
        credentials: Credentials,
        counter: Arc<ApiCallCounter>,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repocensus/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let defaults = CrawlConfig::default();
        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            counter,
            cancel,
            max_retries: defaults.max_rate_limit_retries,
            max_wait: defaults.max_rate_limit_wait(),
        })
    }

    pub fn with_rate_limit_bounds(mut self, max_retries: u32, max_wait: Duration) -> Self {
        self.max_retries = max_retries;
        self.max_wait = max_wait;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn counter(&self) -> &Arc<ApiCallCounter> {
        &self.counter
    }

    /// Absolute URL for an API path such as `/orgs/acme/repos`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a 2xx JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, url, body).await?;
        decode(url, response).await
    }

    /// Like [`request`](Self::request), but a 404 is `Ok(None)` instead of an error.
    pub async fn request_optional<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<T>, ApiError> {
        let response = self.send(method, url, body).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url, "resource not found");
            return Ok(None);
        }
        decode(url, response).await.map(Some)
    }

    /// Bearer token for the configured credentials, exchanging an App installation token if needed.
    pub(crate) async fn bearer_token(&self) -> Result<String, ApiError> {
        self.credentials.bearer_token(self).await
    }

    /// POST without a body, authorized by `bearer` instead of the configured credentials.
    pub(crate) async fn post_with_bearer(&self, url: &str, bearer: &str) -> Result<Response, ApiError> {
        self.send_with(Method::POST, url, None, Bearer::Explicit(bearer)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        self.send_with(method, url, body, Bearer::Configured).await
    }

    async fn send_with(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        bearer: Bearer<'_>,
    ) -> Result<Response, ApiError> {
        let mut retries = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            // Resolved per attempt so a long rate-limit sleep cannot outlive an App token.
            let token = match bearer {
                Bearer::Configured => self.bearer_token().await?,
                Bearer::Explicit(token) => token.to_string(),
            };
            let mut builder = self.client.request(method.clone(), url).bearer_auth(token);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            self.counter.increment();
            let response = tokio::select! {
                _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                sent = builder.send() => sent?,
            };

            let Some(wait) = rate_limit_wait(response.headers(), Utc::now()) else {
                return Ok(response);
            };

            if retries >= self.max_retries {
                return Err(ApiError::RateLimitExhausted {
                    url: url.to_string(),
                    retries,
                });
            }
            if wait > self.max_wait {
                return Err(ApiError::RateLimitWaitTooLong {
                    url: url.to_string(),
                    wait_secs: wait.as_secs(),
                    max_secs: self.max_wait.as_secs(),
                });
            }

            retries += 1;
            warn!(
                url,
                wait_secs = wait.as_secs_f64(),
                attempt = retries,
                "rate limit exhausted, sleeping until reset"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Time to sleep when the remaining quota is zero: until one second past the reset.
///
/// Returns `None` when quota remains or the reset header is missing or malformed.
pub fn rate_limit_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let remaining = headers.get(HEADER_REMAINING)?.to_str().ok()?.trim();
    if remaining != "0" {
        return None;
    }
    let reset = headers.get(HEADER_RESET)?.to_str().ok()?.trim().parse::<i64>().ok()?;
    let resume_at = DateTime::from_timestamp(reset, 0)? + chrono::Duration::seconds(1);
    Some((resume_at - now).to_std().unwrap_or(Duration::ZERO))
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}
