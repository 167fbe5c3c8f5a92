//! Direct fetches with a per-attempt timeout and linear backoff.

use std::time::Duration;

use crate::config::ScraperConfig;
use crate::error::AppError;
use crate::traits::{FetchResponse, Fetcher, RequestOptions};

/// Retry schedule for the direct-fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_unit)
    }

    /// Delay after failed attempt `attempt` (1-indexed): `attempt * unit`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

/// Run one request, converting an overrun of `options.timeout` into
/// [`AppError::Timeout`]. The pending request is dropped on expiry.
pub async fn fetch_with_timeout<F: Fetcher>(
    fetcher: &F,
    url: &str,
    options: &RequestOptions,
) -> Result<FetchResponse, AppError> {
    match tokio::time::timeout(options.timeout, fetcher.get(url, options)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(options.timeout.as_millis() as u64)),
    }
}

/// Fetch `url`, making up to `max_retries + 1` attempts.
///
/// A non-success status is retried like a transport failure but is not
/// itself an exception: only when every attempt has failed does the call
/// return an error, which is the last attempt's. Errors that
/// [`AppError::is_retryable`] rejects end the loop at once.
pub async fn fetch_with_retry<F: Fetcher>(
    fetcher: &F,
    url: &str,
    options: &RequestOptions,
    policy: &RetryPolicy,
) -> Result<FetchResponse, AppError> {
    let attempts = policy.max_retries + 1;
    let mut last_error = None;

    for attempt in 1..=attempts {
        let error = match fetch_with_timeout(fetcher, url, options).await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => AppError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            },
            Err(e) => e,
        };

        if attempt == attempts || !error.is_retryable() {
            last_error = Some(error);
            break;
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            %url,
            attempt,
            max_attempts = attempts,
            backoff_ms = %delay.as_millis(),
            error = %error,
            "Fetch attempt failed, backing off"
        );
        last_error = Some(error);
        tokio::time::sleep(delay).await;
    }

    Err(last_error.unwrap_or_else(|| AppError::Generic(format!("no attempt made for {url}"))))
}
