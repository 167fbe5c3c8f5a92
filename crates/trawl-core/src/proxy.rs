//! Cross-origin fetches routed through an ordered list of CORS relays.
//!
//! Relays are unreliable, so each one gets a single timeout-bound try and
//! any failure moves on to the next. Only when all of them fail does the
//! fetch fail, with [`AppError::SourceUnreachable`].

use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::retry::fetch_with_timeout;
use crate::traits::{Fetcher, RequestOptions};

/// Build a relay URL: the template followed by the percent-encoded target.
pub fn proxied_url(template: &str, target: &str) -> String {
    format!("{template}{}", urlencoding::encode(target))
}

/// Fetches through the first CORS relay that answers successfully.
#[derive(Clone)]
pub struct ProxyFetcher<F> {
    fetcher: F,
    proxies: Arc<[String]>,
    timeout: Duration,
}

impl<F: Fetcher> ProxyFetcher<F> {
    pub fn new(fetcher: F, proxies: Vec<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            proxies: proxies.into(),
            timeout,
        }
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    /// Body of `target` via the first relay returning a success status.
    pub async fn fetch(&self, source_id: &str, target: &str) -> Result<String, AppError> {
        let options = RequestOptions::new(self.timeout);

        for (index, proxy) in self.proxies.iter().enumerate() {
            let url = proxied_url(proxy, target);
            match fetch_with_timeout(&self.fetcher, &url, &options).await {
                Ok(response) if response.is_success() => {
                    tracing::debug!(%source_id, proxy = index, bytes = response.body.len(), "Proxy fetch succeeded");
                    return Ok(response.body);
                }
                Ok(response) => {
                    tracing::debug!(%source_id, proxy = index, status = response.status, "Proxy returned non-success status");
                }
                Err(e) => {
                    tracing::debug!(%source_id, proxy = index, error = %e, "Proxy failed");
                }
            }
        }

        Err(AppError::SourceUnreachable {
            source_id: source_id.to_string(),
            attempts: self.proxies.len(),
        })
    }
}
