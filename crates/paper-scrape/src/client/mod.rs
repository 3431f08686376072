//! Network transport for scrapers.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff
//! - Response caching with a short TTL
//!
//! Host fallback is not handled here; see [`crate::scraper::fetch_with_fallback`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use url::Url;

use crate::config::{Config, api};
use crate::error::{ClientError, ClientResult};

/// Request headers as sent by a source.
pub type Headers = BTreeMap<String, String>;

/// Performs one GET and returns the textual body.
///
/// Implementations own timeouts and low-level retries. Non-2xx statuses and
/// empty bodies must be reported as errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, headers: &Headers) -> ClientResult<String>;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// Response cache.
    cache: Cache<String, String>,

    /// Per-request timeout, reported in [`ClientError::Timeout`].
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(api::MAX_KEEPALIVE)
            .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_secs(10))
            .build_with_max_retries(config.max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        let cache = Cache::builder()
            .max_capacity(config.cache_max_size)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self { client, cache, timeout: config.request_timeout })
    }

    /// Handle response status codes.
    async fn handle_response(&self, response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            404 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::not_found(text))
            }
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::server(status.as_u16(), text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus { status: status.as_u16(), message: text })
            }
        }
    }

    /// Surface timeouts as [`ClientError::Timeout`].
    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() { ClientError::Timeout(self.timeout) } else { ClientError::Http(err) }
    }

    fn classify_middleware(&self, err: reqwest_middleware::Error) -> ClientError {
        match err {
            reqwest_middleware::Error::Reqwest(err) => self.classify(err),
            other => ClientError::Middleware(other),
        }
    }

    /// Generate cache key.
    fn cache_key(&self, url: &Url, headers: &Headers) -> String {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();
        hasher.update(b"GET|");
        hasher.update(url.as_str().as_bytes());
        hasher.update(b"|");

        for (k, v) in headers {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"&");
        }

        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, headers: &Headers) -> ClientResult<String> {
        let cache_key = self.cache_key(url, headers);
        if let Some(cached) = self.cache.get(&cache_key).await {
            tracing::debug!(%url, "Serving cached response");
            return Ok(cached);
        }

        let header_map = to_header_map(headers)?;
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(url.as_str())
            .headers(header_map)
            .send()
            .await
            .map_err(|err| self.classify_middleware(err))?;
        let response = self.handle_response(response).await?;
        let body = response.text().await.map_err(|err| self.classify(err))?;

        if body.trim().is_empty() {
            return Err(ClientError::empty_body(url.as_str()));
        }

        self.cache.insert(cache_key, body.clone()).await;
        Ok(body)
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").field("cached", &self.cache.entry_count()).finish()
    }
}

fn to_header_map(headers: &Headers) -> ClientResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = || ClientError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
