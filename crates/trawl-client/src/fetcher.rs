use trawl_core::config::DEFAULT_USER_AGENT;
use trawl_core::error::AppError;
use trawl_core::traits::{FetchResponse, Fetcher, RequestOptions};
use reqwest::Client;

/// HTTP fetcher using reqwest.
///
/// Returns every HTTP status as data; only transport problems are errors.
/// The timeout comes from each request's [`RequestOptions`], so one client
/// serves both the relay path and the direct API path.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<FetchResponse, AppError> {
        validate_scheme(url)?;

        let mut request = self.client.get(url).timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(options.timeout.as_millis() as u64)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(options.timeout.as_millis() as u64)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;
        tracing::debug!(%url, status, bytes = body.len(), "Fetched");

        Ok(FetchResponse { status, body })
    }
}

/// Only `http` and `https` URLs are fetched.
fn validate_scheme(url: &str) -> Result<(), AppError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| AppError::ConfigError(format!("Invalid URL {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::ConfigError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
