//! HTTP client for provider requests with rate limiting and error handling
//!
//! Every request waits on a process-wide token bucket before it is sent and
//! is bounded by the configured timeout. Non-success statuses are mapped to
//! `ProviderError` variants so callers can tell auth problems from outages.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ProviderError;
use crate::infrastructure::config::defaults;

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("feedback-collector/{}", env!("CARGO_PKG_VERSION")),
            timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            follow_redirects: true,
        }
    }
}

/// Authentication attached to a single request.
#[derive(Clone)]
pub enum RequestAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

impl RequestAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::None => request,
            Self::Bearer(token) => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

/// Body of a fetched HTML page, or the fact that it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
    Found(String),
    NotFound,
}

/// Rate-limited HTTP client shared by all provider adapters
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ProviderError::InvalidRequest(format!("Invalid user agent: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        let quota = Quota::per_second(NonZeroU32::new(config.max_requests_per_second).ok_or_else(
            || ProviderError::InvalidRequest("Rate limit must be greater than 0".to_string()),
        )?);
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: &RequestAuth,
    ) -> Result<Value, ProviderError> {
        self.rate_limiter.until_ready().await;
        tracing::debug!("Fetching JSON: {} {:?}", url, query);

        let request = auth.apply(
            self.client
                .get(url)
                .query(query)
                .header(ACCEPT, "application/json"),
        );
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), url));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Decode(format!("{url}: {e}")))
    }

    /// GET an HTML page. A 404 is reported as `PageBody::NotFound`, not an error.
    pub async fn get_page(&self, url: &str) -> Result<PageBody, ProviderError> {
        self.rate_limiter.until_ready().await;
        tracing::debug!("Fetching page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(PageBody::NotFound);
        }
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), url));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;
        tracing::debug!("Fetched {} ({} chars)", url, text.len());
        Ok(PageBody::Found(text))
    }
}
