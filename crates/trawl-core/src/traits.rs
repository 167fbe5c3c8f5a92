use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::models::JobSource;

/// Per-request knobs passed down to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw HTTP response. Non-success statuses are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a single GET request.
///
/// Implementations report transport failures as `Err` and any HTTP status,
/// successful or not, as `Ok`. Retry, timeout and proxy policy live above
/// this seam.
pub trait Fetcher: Send + Sync + Clone + 'static {
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<FetchResponse, AppError>> + Send;
}

/// Storage gateway for user-added sources. Built-in sources never go here.
pub trait SourceStore: Send + Sync + Clone + 'static {
    fn get_custom_sources(&self) -> Result<Vec<JobSource>, AppError>;

    fn save_custom_sources(&self, sources: &[JobSource]) -> Result<(), AppError>;

    /// The default reads then saves without a lock in between; stores shared
    /// across tasks override this to make the pair atomic.
    fn add_custom_source(&self, source: JobSource) -> Result<(), AppError> {
        let mut sources = self.get_custom_sources()?;
        upsert_source(&mut sources, source);
        self.save_custom_sources(&sources)
    }

    /// Returns true if a source with this id existed.
    fn remove_custom_source(&self, id: &str) -> Result<bool, AppError> {
        let mut sources = self.get_custom_sources()?;
        let removed = remove_source(&mut sources, id);
        if removed {
            self.save_custom_sources(&sources)?;
        }
        Ok(removed)
    }
}

/// Replace any source with the same id, else append.
pub fn upsert_source(sources: &mut Vec<JobSource>, source: JobSource) {
    sources.retain(|s| s.id != source.id);
    sources.push(source);
}

/// Returns true if something was removed.
pub fn remove_source(sources: &mut Vec<JobSource>, id: &str) -> bool {
    let before = sources.len();
    sources.retain(|s| s.id != id);
    sources.len() != before
}

/// Process-lifetime source store for embedders that persist nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceStore {
    sources: Arc<Mutex<Vec<JobSource>>>,
}

impl InMemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<JobSource>) -> Self {
        Self {
            sources: Arc::new(Mutex::new(sources)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<JobSource>>, AppError> {
        self.sources
            .lock()
            .map_err(|_| AppError::StorageError("source store lock poisoned".into()))
    }
}

impl SourceStore for InMemorySourceStore {
    fn get_custom_sources(&self) -> Result<Vec<JobSource>, AppError> {
        Ok(self.lock()?.clone())
    }

    fn save_custom_sources(&self, sources: &[JobSource]) -> Result<(), AppError> {
        *self.lock()? = sources.to_vec();
        Ok(())
    }

    fn add_custom_source(&self, source: JobSource) -> Result<(), AppError> {
        upsert_source(&mut *self.lock()?, source);
        Ok(())
    }

    fn remove_custom_source(&self, id: &str) -> Result<bool, AppError> {
        Ok(remove_source(&mut *self.lock()?, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn custom(id: &str) -> JobSource {
        JobSource::new(id, id, "https://example.com/feed", SourceType::Rss, "Custom")
    }

    #[test]
    fn test_add_replaces_same_id() {
        let store = InMemorySourceStore::new();
        store.add_custom_source(custom("a")).unwrap();
        let mut updated = custom("a");
        updated.name = "renamed".into();
        store.add_custom_source(updated).unwrap();

        let sources = store.get_custom_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "renamed");
    }

    #[test]
    fn test_remove_reports_presence() {
        let store = InMemorySourceStore::with_sources(vec![custom("a"), custom("b")]);
        assert!(store.remove_custom_source("a").unwrap());
        assert!(!store.remove_custom_source("a").unwrap());
        assert_eq!(store.get_custom_sources().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_adds_are_all_kept() {
        let store = InMemorySourceStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.add_custom_source(custom(&format!("c{i}"))).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_custom_sources().unwrap().len(), 8);
    }

    #[test]
    fn test_response_success_range() {
        assert!(FetchResponse::ok("x").is_success());
        assert!(
            !FetchResponse {
                status: 302,
                body: String::new()
            }
            .is_success()
        );
    }
}
