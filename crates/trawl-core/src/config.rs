use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_REMOTE_FIRST_CATEGORY: &str = "Remote Specialists";
pub const DEFAULT_USER_AGENT: &str = "trawl/0.1 (job aggregator)";

/// CORS relays tried in order. Each expects the percent-encoded target appended.
pub const DEFAULT_CORS_PROXIES: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://corsproxy.io/?url=",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// Tunables for a scrape service instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    /// Page size used by the consuming UI; carried, not used by the engine.
    pub jobs_per_batch: usize,
    /// Worker pool size.
    pub max_concurrency: usize,
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    /// Per-request timeout for both direct and proxied fetches.
    pub request_timeout: Duration,
    /// Retries after the first attempt on the direct-fetch path.
    pub max_retries: u32,
    /// Linear backoff step: attempt `n` waits `n * retry_backoff_unit`.
    pub retry_backoff_unit: Duration,
    /// Minimum spacing between outbound fetches of one service instance.
    pub rate_limit_delay: Duration,
    /// Sources in this category are scheduled and listed first.
    pub remote_first_category: String,
    pub cors_proxies: Vec<String>,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            jobs_per_batch: 20,
            max_concurrency: 3,
            cache_ttl: Duration::from_secs(5 * 60),
            cache_max_size: 100,
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_backoff_unit: Duration::from_secs(1),
            rate_limit_delay: Duration::from_millis(2000),
            remote_first_category: DEFAULT_REMOTE_FIRST_CATEGORY.to_string(),
            cors_proxies: DEFAULT_CORS_PROXIES.iter().map(|p| p.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScraperConfig {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// - `TRAWL_JOBS_PER_BATCH`, `TRAWL_MAX_CONCURRENCY`, `TRAWL_CACHE_MAX_SIZE` (>= 1)
    /// - `TRAWL_CACHE_TTL_MS`, `TRAWL_REQUEST_TIMEOUT_MS` (>= 1)
    /// - `TRAWL_MAX_RETRIES`, `TRAWL_RETRY_BACKOFF_MS`, `TRAWL_RATE_LIMIT_DELAY_MS` (>= 0)
    /// - `TRAWL_REMOTE_FIRST_CATEGORY`, `TRAWL_USER_AGENT`
    /// - `TRAWL_CORS_PROXIES` (comma-separated, order preserved)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = positive(&lookup, "TRAWL_JOBS_PER_BATCH")? {
            config.jobs_per_batch = v as usize;
        }
        if let Some(v) = positive(&lookup, "TRAWL_MAX_CONCURRENCY")? {
            config.max_concurrency = v as usize;
        }
        if let Some(v) = positive(&lookup, "TRAWL_CACHE_MAX_SIZE")? {
            config.cache_max_size = v as usize;
        }
        if let Some(v) = positive(&lookup, "TRAWL_CACHE_TTL_MS")? {
            config.cache_ttl = Duration::from_millis(v);
        }
        if let Some(v) = positive(&lookup, "TRAWL_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(v);
        }
        if let Some(v) = non_negative(&lookup, "TRAWL_MAX_RETRIES")? {
            config.max_retries = u32::try_from(v).map_err(|_| {
                AppError::ConfigError(format!("TRAWL_MAX_RETRIES '{v}' is too large"))
            })?;
        }
        if let Some(v) = non_negative(&lookup, "TRAWL_RETRY_BACKOFF_MS")? {
            config.retry_backoff_unit = Duration::from_millis(v);
        }
        if let Some(v) = non_negative(&lookup, "TRAWL_RATE_LIMIT_DELAY_MS")? {
            config.rate_limit_delay = Duration::from_millis(v);
        }
        if let Some(v) = lookup("TRAWL_REMOTE_FIRST_CATEGORY") {
            config.remote_first_category = v;
        }
        if let Some(v) = lookup("TRAWL_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(raw) = lookup("TRAWL_CORS_PROXIES") {
            let proxies: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if proxies.is_empty() {
                return Err(AppError::ConfigError(
                    "TRAWL_CORS_PROXIES must list at least one proxy".into(),
                ));
            }
            config.cors_proxies = proxies;
        }

        Ok(config)
    }
}

fn non_negative<L>(lookup: &L, key: &str) -> Result<Option<u64>, AppError>
where
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid {key} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}

fn positive<L>(lookup: &L, key: &str) -> Result<Option<u64>, AppError>
where
    L: Fn(&str) -> Option<String>,
{
    match non_negative(lookup, key)? {
        Some(0) => Err(AppError::ConfigError(format!("{key} must be at least 1"))),
        other => Ok(other),
    }
}
