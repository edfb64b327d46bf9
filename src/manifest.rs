//! Time-boxed cache for the catalog front-end's build manifest id.
//!
//! One value and one timestamp, shared by every call for the lifetime of the
//! process. Both are written together under a single lock so a reader never
//! pairs a timestamp with a value from another write. The lock is not held
//! across the refresh fetch: two readers racing on an expired entry may both
//! fetch, and the last write wins.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;

pub const DEFAULT_TTL_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
struct Entry {
    value: Option<String>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ManifestCache {
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TTL_MINUTES))
    }
}

impl ManifestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached id if one was extracted and the last write is younger than
    /// the TTL at `now`.
    pub fn lookup(&self, now: DateTime<Utc>) -> Option<String> {
        let entry = self.entry.lock();
        entry
            .as_ref()
            .filter(|entry| now - entry.fetched_at < self.ttl)
            .and_then(|entry| entry.value.clone())
    }

    pub fn store(&self, value: Option<String>, now: DateTime<Utc>) {
        *self.entry.lock() = Some(Entry {
            value,
            fetched_at: now,
        });
    }

    /// Serves a fresh id, or runs `refresh` once and records its result.
    ///
    /// A refresh that yields nothing still records the time of the attempt,
    /// but an absent id is never served, so the next call fetches again.
    pub async fn get_or_refresh<F, Fut>(&self, now: DateTime<Utc>, refresh: F) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        if let Some(value) = self.lookup(now) {
            debug!(%value, "build manifest served from cache");
            return Some(value);
        }
        let value = refresh().await;
        debug!(?value, "build manifest refreshed");
        self.store(value.clone(), now);
        value
    }
}
