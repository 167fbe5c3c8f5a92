pub mod adapters;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pool;
pub mod proxy;
pub mod retry;
pub mod scrape;
pub mod text;
pub mod throttle;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::ResultCache;
pub use config::ScraperConfig;
pub use error::AppError;
pub use models::{JobSource, NormalizedJob, ScrapeConfig, ScrapeProgress, SourceType};
pub use pool::WorkerPool;
pub use scrape::{
    ProgressCallback, ScrapeEvent, ScrapeReporter, ScrapeService, ScrapeState,
    TracingScrapeReporter,
};
pub use throttle::RateLimiter;
pub use traits::{FetchResponse, Fetcher, InMemorySourceStore, RequestOptions, SourceStore};
