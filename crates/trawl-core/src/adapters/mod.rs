//! Named public job-board APIs with bespoke response shapes.
//!
//! These endpoints are reachable directly, so they skip the CORS relays and
//! go through [`fetch_with_retry`] instead. Each adapter is a pure parse
//! function plus a thin fetch step; the parse functions are what the tests
//! exercise.

pub mod arbeitnow;
pub mod hackernews;
pub mod himalayas;
pub mod remoteok;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::AppError;
use crate::extract::parse_json;
use crate::models::{JobSource, NormalizedJob};
use crate::retry::{RetryPolicy, fetch_with_retry};
use crate::throttle::RateLimiter;
use crate::traits::{Fetcher, RequestOptions};

/// Which bespoke mapping a source id selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAdapter {
    RemoteOk,
    Himalayas,
    Arbeitnow,
    HackerNews,
    /// Unknown API: direct fetch, generic JSON extraction.
    Generic,
}

impl ApiAdapter {
    pub fn for_source(source_id: &str) -> Self {
        match source_id {
            "remoteok" => ApiAdapter::RemoteOk,
            "himalayas" => ApiAdapter::Himalayas,
            "arbeitnow" => ApiAdapter::Arbeitnow,
            "hackernews" => ApiAdapter::HackerNews,
            _ => ApiAdapter::Generic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ApiAdapter::RemoteOk => "remoteok",
            ApiAdapter::Himalayas => "himalayas",
            ApiAdapter::Arbeitnow => "arbeitnow",
            ApiAdapter::HackerNews => "hackernews",
            ApiAdapter::Generic => "generic",
        }
    }

    /// Fetch and normalize everything this API returns for `keywords`.
    ///
    /// Errors propagate; the orchestrator decides how to degrade.
    pub async fn fetch<F: Fetcher>(
        &self,
        client: &DirectClient<'_, F>,
        source: &JobSource,
        keywords: &[String],
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<NormalizedJob>, AppError> {
        match self {
            ApiAdapter::RemoteOk => {
                let url = remoteok::request_url(&source.url, keywords)?;
                let body = client.body(&url).await?;
                remoteok::parse(&body, source, fetched_at)
            }
            ApiAdapter::Himalayas => himalayas::fetch(client, source, keywords, fetched_at).await,
            ApiAdapter::Arbeitnow => {
                let body = client.body(&source.url).await?;
                arbeitnow::parse(&body, source, keywords, fetched_at)
            }
            ApiAdapter::HackerNews => {
                let body = client.body(&source.url).await?;
                hackernews::parse(&body, source, keywords, fetched_at)
            }
            ApiAdapter::Generic => {
                let body = client.body(&source.url).await?;
                parse_json(&body, source, keywords, fetched_at)
            }
        }
    }
}

/// Direct, retrying transport shared by the adapters.
pub struct DirectClient<'a, F> {
    fetcher: &'a F,
    options: &'a RequestOptions,
    policy: &'a RetryPolicy,
    /// Paces follow-up requests (pagination) of a single adapter run.
    limiter: &'a RateLimiter,
}

impl<'a, F: Fetcher> DirectClient<'a, F> {
    pub fn new(
        fetcher: &'a F,
        options: &'a RequestOptions,
        policy: &'a RetryPolicy,
        limiter: &'a RateLimiter,
    ) -> Self {
        Self {
            fetcher,
            options,
            policy,
            limiter,
        }
    }

    pub async fn body(&self, url: &str) -> Result<String, AppError> {
        let response = fetch_with_retry(self.fetcher, url, self.options, self.policy).await?;
        Ok(response.body)
    }

    /// Like [`body`](Self::body), but waits on the rate limiter first.
    pub async fn paced_body(&self, url: &str) -> Result<String, AppError> {
        self.limiter.wait().await;
        self.body(url).await
    }
}

/// `base` with the given query parameters appended.
pub(crate) fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
    let mut url =
        Url::parse(base).map_err(|e| AppError::ConfigError(format!("invalid API URL {base}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// Serde helper: an explicit `null` reads as the field's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lowercased, trimmed, non-empty keywords.
pub(crate) fn normalized_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
