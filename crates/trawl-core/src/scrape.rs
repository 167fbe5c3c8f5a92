use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::adapters::{ApiAdapter, DirectClient};
use crate::cache::{ResultCache, cache_key};
use crate::catalog::{builtin_sources, default_ats_vendors};
use crate::config::ScraperConfig;
use crate::error::AppError;
use crate::extract::{looks_like, parse_ats, parse_html, parse_json, parse_rss};
use crate::models::{
    AtsVendor, JobSource, NormalizedJob, ScrapeConfig, ScrapeProgress, SourceType,
};
use crate::pool::WorkerPool;
use crate::proxy::ProxyFetcher;
use crate::retry::RetryPolicy;
use crate::throttle::RateLimiter;
use crate::traits::{Fetcher, RequestOptions, SourceStore};

/// Invoked once per finished source while a scrape runs.
pub type ProgressCallback = Arc<dyn Fn(&ScrapeProgress) + Send + Sync>;

/// Lifecycle of the most recent orchestrated scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    Scraping,
    Complete,
    Aborted,
}

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    Started {
        sources: usize,
        keywords: &'a [String],
    },
    CacheHit {
        source_id: &'a str,
        jobs: usize,
    },
    SourceCompleted {
        source_id: &'a str,
        jobs: usize,
    },
    SourceFailed {
        source_id: &'a str,
        error: &'a str,
    },
    SourceSkipped {
        source_id: &'a str,
    },
    Finished {
        state: ScrapeState,
        jobs: usize,
        elapsed_ms: u64,
    },
}

/// Trait for receiving orchestrator events (decoupled logging).
pub trait ScrapeReporter: Send + Sync {
    fn report(&self, event: ScrapeEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScrapeReporter;

impl ScrapeReporter for TracingScrapeReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::Started { sources, keywords } => {
                tracing::info!(sources, ?keywords, "Scrape started");
            }
            ScrapeEvent::CacheHit { source_id, jobs } => {
                tracing::debug!(%source_id, jobs, "Cache hit");
            }
            ScrapeEvent::SourceCompleted { source_id, jobs } => {
                tracing::info!(%source_id, jobs, "Source scraped");
            }
            ScrapeEvent::SourceFailed { source_id, error } => {
                tracing::warn!(%source_id, %error, "Source failed, continuing without it");
            }
            ScrapeEvent::SourceSkipped { source_id } => {
                tracing::info!(%source_id, "Source skipped after abort");
            }
            ScrapeEvent::Finished {
                state,
                jobs,
                elapsed_ms,
            } => {
                tracing::info!(?state, jobs, elapsed_ms, "Scrape finished");
            }
        }
    }
}

struct Control {
    token: CancellationToken,
    state: ScrapeState,
    /// Bumped per scrape so a superseded run cannot overwrite the state.
    generation: u64,
}

#[derive(Default)]
struct MergeState {
    jobs: Vec<NormalizedJob>,
    seen: HashSet<String>,
    completed: usize,
}

/// Multi-source scrape orchestrator.
///
/// Generic over the transport and the custom-source store, so the whole
/// engine runs against mocks in tests. Cloning is cheap and clones share
/// the cache, the rate limiter and the abort handle.
#[derive(Clone)]
pub struct ScrapeService<F, S>
where
    F: Fetcher,
    S: SourceStore,
{
    fetcher: F,
    store: S,
    proxy: ProxyFetcher<F>,
    limiter: RateLimiter,
    cache: Arc<ResultCache>,
    builtin: Arc<[JobSource]>,
    vendors: Arc<HashMap<String, AtsVendor>>,
    config: Arc<ScraperConfig>,
    control: Arc<Mutex<Control>>,
    reporter: Arc<dyn ScrapeReporter>,
}

impl<F, S> ScrapeService<F, S>
where
    F: Fetcher,
    S: SourceStore,
{
    /// Service over the built-in catalog and ATS vendor table.
    pub fn new(fetcher: F, store: S, config: ScraperConfig) -> Self {
        Self {
            proxy: ProxyFetcher::new(
                fetcher.clone(),
                config.cors_proxies.clone(),
                config.request_timeout,
            ),
            limiter: RateLimiter::new(config.rate_limit_delay),
            cache: Arc::new(ResultCache::new(config.cache_ttl, config.cache_max_size)),
            builtin: builtin_sources().into(),
            vendors: Arc::new(default_ats_vendors()),
            control: Arc::new(Mutex::new(Control {
                token: CancellationToken::new(),
                state: ScrapeState::Idle,
                generation: 0,
            })),
            reporter: Arc::new(TracingScrapeReporter),
            config: Arc::new(config),
            fetcher,
            store,
        }
    }

    pub fn with_builtin_sources(mut self, sources: Vec<JobSource>) -> Self {
        self.builtin = sources.into();
        self
    }

    pub fn with_ats_vendors(mut self, vendors: HashMap<String, AtsVendor>) -> Self {
        self.vendors = Arc::new(vendors);
        self
    }

    pub fn with_reporter<R: ScrapeReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned scrape control mutex");
            poisoned.into_inner()
        })
    }

    pub fn state(&self) -> ScrapeState {
        self.lock_control().state
    }

    /// Signal the running scrape. Sources not yet started are skipped;
    /// fetches already in flight run until their own timeout.
    pub fn abort(&self) {
        let mut control = self.lock_control();
        control.token.cancel();
        if control.state == ScrapeState::Scraping {
            control.state = ScrapeState::Aborted;
        }
        tracing::info!("Scrape abort requested");
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Scrape every selected source and merge the results.
    ///
    /// Per-source failures never fail the call: such a source reports zero
    /// jobs through `on_progress` and the scrape carries on. The result is
    /// deduplicated on lowercase title and company, then ordered with the
    /// remote-first category ahead and newest postings first.
    pub async fn scrape_jobs(
        &self,
        config: &ScrapeConfig,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Vec<NormalizedJob>, AppError> {
        let started = Instant::now();
        let token = CancellationToken::new();
        let generation = {
            let mut control = self.lock_control();
            control.token = token.clone();
            control.state = ScrapeState::Scraping;
            control.generation += 1;
            control.generation
        };

        let sources = self.resolve_sources(config);
        let total = sources.len();
        self.reporter.report(ScrapeEvent::Started {
            sources: total,
            keywords: &config.keywords,
        });

        let pool = WorkerPool::new(self.config.max_concurrency);
        let merged = Arc::new(Mutex::new(MergeState::default()));
        let keywords: Arc<[String]> = config.keywords.clone().into();
        let mut handles = Vec::with_capacity(total);

        for source in sources {
            let service = self.clone();
            let token = token.clone();
            let merged = Arc::clone(&merged);
            let keywords = Arc::clone(&keywords);
            let on_progress = on_progress.clone();
            let max_jobs = config.max_jobs_per_source;

            handles.push(pool.add(async move {
                let mut jobs = if token.is_cancelled() {
                    service.reporter.report(ScrapeEvent::SourceSkipped {
                        source_id: &source.id,
                    });
                    Vec::new()
                } else {
                    service.fetch_guarded(&source, &keywords).await
                };
                if let Some(max) = max_jobs {
                    jobs.truncate(max);
                }

                let found = jobs.len();
                let progress = {
                    let mut merged = merged.lock().unwrap_or_else(|p| p.into_inner());
                    for job in jobs {
                        if merged.seen.insert(job.dedup_key()) {
                            merged.jobs.push(job);
                        }
                    }
                    merged.completed += 1;
                    ScrapeProgress {
                        current: merged.completed,
                        total,
                        source_id: source.id.clone(),
                        source_name: source.name.clone(),
                        jobs_found: found,
                        total_jobs: merged.jobs.len(),
                        is_complete: merged.completed == total,
                    }
                };
                if let Some(callback) = &on_progress {
                    callback(&progress);
                }
                Ok(found)
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Source task failed");
            }
        }
        pool.drain().await;

        let mut jobs = {
            let mut merged = merged.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::take(&mut merged.jobs)
        };
        sort_remote_first(&mut jobs, &self.config.remote_first_category);

        let state = if token.is_cancelled() {
            ScrapeState::Aborted
        } else {
            ScrapeState::Complete
        };
        {
            let mut control = self.lock_control();
            if control.generation == generation {
                control.state = state;
            }
        }
        self.reporter.report(ScrapeEvent::Finished {
            state,
            jobs: jobs.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        Ok(jobs)
    }

    /// Scrape one source. Never fails: any error is reported and yields an
    /// empty list. Successful results are cached per source and keywords.
    pub async fn fetch_from_source(
        &self,
        source: &JobSource,
        keywords: &[String],
    ) -> Vec<NormalizedJob> {
        let key = cache_key(source.source_type, &source.id, keywords);
        if let Some(jobs) = self.cache.get(&key) {
            self.reporter.report(ScrapeEvent::CacheHit {
                source_id: &source.id,
                jobs: jobs.len(),
            });
            return jobs;
        }

        match self.fetch_uncached(source, keywords).await {
            Ok(jobs) => {
                self.reporter.report(ScrapeEvent::SourceCompleted {
                    source_id: &source.id,
                    jobs: jobs.len(),
                });
                self.cache.set(key, jobs.clone());
                jobs
            }
            Err(e) => {
                self.reporter.report(ScrapeEvent::SourceFailed {
                    source_id: &source.id,
                    error: &e.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// [`fetch_from_source`](Self::fetch_from_source) that also survives a
    /// panicking extractor.
    async fn fetch_guarded(&self, source: &JobSource, keywords: &[String]) -> Vec<NormalizedJob> {
        match AssertUnwindSafe(self.fetch_from_source(source, keywords))
            .catch_unwind()
            .await
        {
            Ok(jobs) => jobs,
            Err(_) => {
                self.reporter.report(ScrapeEvent::SourceFailed {
                    source_id: &source.id,
                    error: "extractor panicked",
                });
                Vec::new()
            }
        }
    }

    async fn fetch_uncached(
        &self,
        source: &JobSource,
        keywords: &[String],
    ) -> Result<Vec<NormalizedJob>, AppError> {
        let fetched_at = Utc::now();

        if source.source_type == SourceType::Api {
            let adapter = ApiAdapter::for_source(&source.id);
            tracing::debug!(source_id = %source.id, adapter = adapter.name(), "Direct API fetch");
            let options = RequestOptions::new(self.config.request_timeout)
                .with_header("Accept", "application/json, text/html");
            let policy = RetryPolicy::from_config(&self.config);
            let client = DirectClient::new(&self.fetcher, &options, &policy, &self.limiter);
            self.limiter.wait().await;
            return adapter.fetch(&client, source, keywords, fetched_at).await;
        }

        // Vendor config is checked before spending a request on the page.
        let vendor = match &source.ats {
            Some(key) => Some(self.vendors.get(key).ok_or_else(|| {
                AppError::ConfigError(format!("no ATS vendor configured for '{key}'"))
            })?),
            None => None,
        };

        self.limiter.wait().await;
        let body = self.proxy.fetch(&source.id, &source.url).await?;

        match (source.source_type, vendor) {
            (SourceType::Rss, _) => parse_rss(&body, source, keywords, fetched_at),
            (SourceType::Json, _) => parse_json(&body, source, keywords, fetched_at),
            (SourceType::Html, Some(vendor)) => {
                parse_ats(&body, source, vendor, keywords, fetched_at)
            }
            (SourceType::Html, None) => parse_html(&body, source, keywords, fetched_at),
            (SourceType::Api, _) => Ok(Vec::new()),
        }
    }

    /// Probe a candidate URL through the relays and sanity-check the body
    /// against the declared type.
    pub async fn test_custom_source(&self, url: &str, source_type: SourceType) -> bool {
        self.limiter.wait().await;
        match self.proxy.fetch("probe", url).await {
            Ok(body) => {
                let ok = looks_like(source_type, &body);
                tracing::info!(%url, %source_type, ok, bytes = body.len(), "Probed custom source");
                ok
            }
            Err(e) => {
                tracing::info!(%url, error = %e, "Custom source unreachable");
                false
            }
        }
    }

    pub fn builtin_sources(&self) -> &[JobSource] {
        &self.builtin
    }

    pub fn custom_sources(&self) -> Result<Vec<JobSource>, AppError> {
        self.store.get_custom_sources()
    }

    /// Built-ins followed by custom sources.
    pub fn all_sources(&self) -> Result<Vec<JobSource>, AppError> {
        let mut sources = self.builtin.to_vec();
        sources.extend(self.store.get_custom_sources()?);
        Ok(sources)
    }

    /// Register an enabled custom source with a fresh `custom-<uuid>` id.
    pub fn add_custom_source(
        &self,
        name: &str,
        url: &str,
        source_type: SourceType,
        category: &str,
    ) -> Result<JobSource, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::ConfigError("source name must not be empty".into()));
        }
        Url::parse(url).map_err(|e| AppError::ConfigError(format!("invalid source URL {url}: {e}")))?;

        let source = JobSource::new(
            format!("custom-{}", Uuid::new_v4()),
            name,
            url,
            source_type,
            category,
        );
        self.store.add_custom_source(source.clone())?;
        tracing::info!(source_id = %source.id, %url, "Custom source added");
        Ok(source)
    }

    /// Returns true if the source existed.
    pub fn remove_custom_source(&self, id: &str) -> Result<bool, AppError> {
        let removed = self.store.remove_custom_source(id)?;
        tracing::info!(source_id = %id, removed, "Custom source removal");
        Ok(removed)
    }

    /// Explicit selection (in catalog order), else every enabled source,
    /// then a stable partition putting the remote-first category ahead.
    fn resolve_sources(&self, config: &ScrapeConfig) -> Vec<JobSource> {
        let mut sources = self.builtin.to_vec();
        match self.store.get_custom_sources() {
            Ok(custom) => sources.extend(custom),
            Err(e) => {
                tracing::warn!(error = %e, "Custom sources unavailable, using built-ins only");
            }
        }

        if config.selected_sources.is_empty() {
            sources.retain(|s| s.enabled);
        } else {
            let selected: HashSet<&str> =
                config.selected_sources.iter().map(String::as_str).collect();
            sources.retain(|s| selected.contains(s.id.as_str()));
            if sources.len() < selected.len() {
                let known: HashSet<&str> = sources.iter().map(|s| s.id.as_str()).collect();
                let missing: Vec<&&str> = selected.iter().filter(|id| !known.contains(**id)).collect();
                tracing::warn!(?missing, "Unknown source ids in selection");
            }
        }

        let remote = self.config.remote_first_category.as_str();
        sources.sort_by_key(|s| s.category != remote);
        sources
    }
}

/// Remote-first category ahead, then newest first. Title and id break ties
/// so the order never depends on task completion order.
pub fn sort_remote_first(jobs: &mut [NormalizedJob], remote_category: &str) {
    let is_remote = |job: &NormalizedJob| job.category.as_deref() == Some(remote_category);
    jobs.sort_by(|a, b| {
        is_remote(b)
            .cmp(&is_remote(a))
            .then_with(|| b.posted_at.cmp(&a.posted_at))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
}
