//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::AppError;
use crate::models::{JobSource, SourceType};
use crate::traits::{FetchResponse, Fetcher, RequestOptions, SourceStore};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// One scripted reply for a route.
#[derive(Debug, Clone)]
pub enum MockReply {
    Status(u16, String),
    NetworkError(String),
    /// Refused before any I/O, like a URL with an unsupported scheme.
    Rejected(String),
    /// Never answers within any sane timeout.
    Hang,
}

impl MockReply {
    pub fn ok(body: &str) -> Self {
        MockReply::Status(200, body.to_string())
    }
}

struct Route {
    pattern: String,
    /// The last reply is sticky once the others are consumed.
    replies: VecDeque<MockReply>,
}

/// Mock fetcher answering by URL substring, first registered match wins.
///
/// Unmatched URLs fail with a network error, like an unreachable host.
#[derive(Clone, Default)]
pub struct MockFetcher {
    routes: Arc<Mutex<Vec<Route>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, body: &str) -> Self {
        self.route_sequence(pattern, vec![MockReply::ok(body)])
    }

    pub fn route_status(self, pattern: &str, status: u16, body: &str) -> Self {
        self.route_sequence(pattern, vec![MockReply::Status(status, body.to_string())])
    }

    pub fn route_error(self, pattern: &str) -> Self {
        self.route_sequence(
            pattern,
            vec![MockReply::NetworkError("connection refused".into())],
        )
    }

    pub fn route_rejected(self, pattern: &str) -> Self {
        self.route_sequence(
            pattern,
            vec![MockReply::Rejected("scheme not allowed".into())],
        )
    }

    pub fn route_hang(self, pattern: &str) -> Self {
        self.route_sequence(pattern, vec![MockReply::Hang])
    }

    pub fn route_sequence(self, pattern: &str, replies: Vec<MockReply>) -> Self {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
        self
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }

    fn next_reply(&self, url: &str) -> MockReply {
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.iter_mut().find(|r| url.contains(&r.pattern)) else {
            return MockReply::NetworkError(format!("no route for {url}"));
        };
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap()
        } else {
            route
                .replies
                .front()
                .cloned()
                .unwrap_or(MockReply::NetworkError("route exhausted".into()))
        }
    }
}

impl Fetcher for MockFetcher {
    async fn get(&self, url: &str, _options: &RequestOptions) -> Result<FetchResponse, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.next_reply(url) {
            MockReply::Status(status, body) => Ok(FetchResponse { status, body }),
            MockReply::NetworkError(msg) => Err(AppError::NetworkError(msg)),
            MockReply::Rejected(msg) => Err(AppError::ConfigError(msg)),
            MockReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::Generic("hang elapsed".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FailingSourceStore
// ---------------------------------------------------------------------------

/// Store whose every operation fails, for error-propagation tests.
#[derive(Clone, Default)]
pub struct FailingSourceStore;

impl SourceStore for FailingSourceStore {
    fn get_custom_sources(&self) -> Result<Vec<JobSource>, AppError> {
        Err(AppError::StorageError("disk full".into()))
    }

    fn save_custom_sources(&self, _sources: &[JobSource]) -> Result<(), AppError> {
        Err(AppError::StorageError("disk full".into()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn test_source(id: &str, source_type: SourceType, category: &str) -> JobSource {
    JobSource::new(
        id,
        format!("Source {id}"),
        format!("https://{id}.example.com/jobs"),
        source_type,
        category,
    )
}

/// Fixed instant so parsed dates compare deterministically.
pub fn fetched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Remote Jobs</title>
    <atom:link href="https://feed.example.com/rss" rel="self" type="application/rss+xml"/>
    <item>
      <title>Senior Engineer at Acme Corp - Remote</title>
      <link>https://feed.example.com/jobs/1</link>
      <pubDate>Mon, 03 Jun 2024 09:30:00 +0000</pubDate>
      <category>Engineering</category>
      <description><![CDATA[<p>Build <b>React</b> apps&nbsp;for customers.</p>]]></description>
    </item>
    <item>
      <title>Globex: Java Developer</title>
      <link>https://feed.example.com/jobs/2</link>
      <pubDate>Sun, 02 Jun 2024 08:00:00 GMT</pubDate>
      <description>Maintain legacy services.</description>
    </item>
    <item>
      <title>Data Analyst</title>
      <link>https://feed.example.com/jobs/3</link>
      <description>Spreadsheets and dashboards.</description>
    </item>
  </channel>
</rss>"#;
