//! HTTP client for fetching listing and detail pages
//!
//! Every request goes through one `governor` rate limiter and carries the
//! configured timeout. Retryable failures are retried with exponential
//! backoff plus jitter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{Client, ClientBuilder, StatusCode, header::RETRY_AFTER};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{FetchError, PageFetcher};
use crate::infrastructure::config::HttpConfig;

/// Longest wait honoured from a `Retry-After` header
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Rate-limited HTTP client; cheap to clone, clones share the limiter
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            config,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn check_url(url: &str) -> Result<(), FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let parsed = url::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if matches!(parsed.scheme(), "http" | "https") {
            Ok(())
        } else {
            Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())))
        }
    }

    fn classify(url: &str, error: &reqwest::Error) -> FetchError {
        let url = url.to_string();
        if error.is_timeout() {
            FetchError::Timeout { url }
        } else if error.is_connect() {
            FetchError::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            FetchError::Request {
                url,
                message: error.to_string(),
            }
        }
    }

    /// Delay before attempt `attempt + 1`: base * 2^(attempt-1) plus up to
    /// half the base as jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_delay_ms;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)));
        let jitter = if base > 1 { fastrand::u64(0..base / 2) } else { 0 };
        Duration::from_millis(exponential.saturating_add(jitter))
    }

    /// Single attempt. On a non-success status, also returns the server's
    /// `Retry-After` hint.
    async fn fetch_once(&self, url: &str) -> Result<String, (FetchError, Option<Duration>)> {
        self.rate_limiter.until_ready().await;

        debug!("HTTP GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| (Self::classify(url, &e), None))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = if matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE) {
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
            } else {
                None
            };
            return Err((
                FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                },
                retry_after,
            ));
        }

        response.text().await.map_err(|e| {
            let error = if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            };
            (error, None)
        })
    }

    /// Fetch URL and return text content, retrying retryable failures
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Self::check_url(url)?;

        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(text) => {
                    debug!("Fetched {} ({} bytes, attempt {})", url, text.len(), attempt);
                    return Ok(text);
                }
                Err((error, retry_after)) if error.is_retryable() && attempt < max_attempts => {
                    let delay = retry_after
                        .unwrap_or_default()
                        .max(self.backoff_delay(attempt));
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt, max_attempts, url, error, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err((error, _)) => {
                    if attempt > 1 {
                        info!("Giving up on {} after {} attempts", url, attempt);
                    }
                    return Err(error);
                }
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HttpConfig {
        HttpConfig {
            retry_base_delay_ms: 100,
            ..HttpConfig::default()
        }
    }

    #[test]
    fn client_creation() {
        assert!(HttpClient::new(HttpConfig::default()).is_ok());
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = HttpConfig {
            max_requests_per_second: 0,
            ..HttpConfig::default()
        };
        assert!(HttpClient::new(config).is_err());
    }

    #[test]
    fn backoff_grows_exponentially_with_bounded_jitter() {
        let client = HttpClient::new(config()).unwrap();
        for _ in 0..20 {
            let first = client.backoff_delay(1).as_millis();
            let third = client.backoff_delay(3).as_millis();
            assert!((100..150).contains(&first), "{first}");
            assert!((400..450).contains(&third), "{third}");
        }
    }

    #[tokio::test]
    async fn non_http_url_is_rejected_without_a_request() {
        let client = HttpClient::new(config()).unwrap();
        let err = client.get_text("ftp://x.test/list").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert!(!err.is_retryable());
    }
}
