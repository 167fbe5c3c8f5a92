//! Request pacing shared by every source one service instance scrapes.
//!
//! Unlike per-domain politeness, the limiter here holds a single
//! timestamp: all sources scraped through the same [`ScrapeService`]
//! draw from one budget of one request per `delay`.
//!
//! [`ScrapeService`]: crate::scrape::ScrapeService

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Gate that resolves at most once per `delay`.
#[derive(Clone)]
pub struct RateLimiter {
    delay: Duration,
    /// Resolution time of the previous `wait`.
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Suspend until at least `delay` has passed since the previous
    /// call resolved. The first call resolves immediately.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// behind each other and are released one `delay` apart.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.delay {
                let sleep_duration = self.delay - elapsed;
                tracing::debug!(
                    sleep_ms = %sleep_duration.as_millis(),
                    "Rate limiting request"
                );
                tokio::time::sleep(sleep_duration).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_wait_resolves_immediately() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn consecutive_waits_are_spaced_by_delay() {
        let delay = Duration::from_millis(60);
        let limiter = RateLimiter::new(delay);

        let mut stamps = Vec::new();
        for _ in 0..4 {
            limiter.wait().await;
            stamps.push(Instant::now());
        }

        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= delay, "waits only {gap:?} apart");
        }
    }

    #[tokio::test]
    async fn concurrent_waiters_are_serialised() {
        let delay = Duration::from_millis(50);
        let limiter = RateLimiter::new(delay);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.wait().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        assert!(stamps[2] - stamps[0] >= delay * 2);
    }

    #[tokio::test]
    async fn clones_share_one_budget() {
        let delay = Duration::from_millis(80);
        let a = RateLimiter::new(delay);
        let b = a.clone();

        let start = Instant::now();
        a.wait().await;
        b.wait().await;
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test]
    async fn zero_delay_never_sleeps() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
