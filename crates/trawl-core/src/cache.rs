//! Time-boxed, capacity-bounded memo of per-source scrape results.
//!
//! Entries expire `ttl` after they were written. When full, the least
//! recently touched entry (by insertion or hit) is evicted. Nothing
//! survives the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::models::{NormalizedJob, SourceType};

struct CacheEntry {
    records: Vec<NormalizedJob>,
    stored_at: Instant,
    /// Recency stamp; larger is more recent.
    touched: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// `touched` stamp -> key, oldest first.
    recency: BTreeMap<u64, String>,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.touched);
        Some(entry)
    }
}

/// Thread-safe result cache keyed by [`cache_key`].
pub struct ResultCache {
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl ResultCache {
    /// A cache holding up to `capacity` entries (at least one) for `ttl`.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned result cache mutex");
            poisoned.into_inner()
        })
    }

    /// Fresh records for `key`, or `None` on a miss.
    ///
    /// A stale entry is evicted as a side effect; a hit becomes the most
    /// recently used entry.
    pub fn get(&self, key: &str) -> Option<Vec<NormalizedJob>> {
        let mut state = self.lock_state();

        let stored_at = state.entries.get(key)?.stored_at;
        if stored_at.elapsed() > self.ttl {
            state.remove(key);
            tracing::debug!(%key, "Cache entry expired");
            return None;
        }

        let stamp = state.tick();
        let entry = state.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.touched, stamp);
        let records = entry.records.clone();
        state.recency.remove(&previous);
        state.recency.insert(stamp, key.to_string());
        Some(records)
    }

    /// Insert or overwrite `key`, evicting the least recently used entry
    /// when a new key would exceed capacity.
    pub fn set(&self, key: impl Into<String>, records: Vec<NormalizedJob>) {
        let key = key.into();
        let mut state = self.lock_state();

        if state.remove(&key).is_none() && state.entries.len() >= self.capacity {
            let oldest = state.recency.iter().next().map(|(_, k)| k.clone());
            if let Some(oldest) = oldest {
                state.remove(&oldest);
                tracing::debug!(evicted = %oldest, "Cache full, evicted least recently used");
            }
        }

        let stamp = state.tick();
        state.recency.insert(stamp, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                records,
                stored_at: Instant::now(),
                touched: stamp,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_state().entries.contains_key(key)
    }

    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.recency.clear();
    }
}

/// Composite key: source type, source id, and the normalized keyword set.
///
/// Keywords are lowercased and sorted so that `["Rust", "go"]` and
/// `["go", "rust"]` share an entry.
pub fn cache_key(source_type: SourceType, source_id: &str, keywords: &[String]) -> String {
    let mut normalized: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    format!("{source_type}:{source_id}:{}", normalized.join(","))
}
