//! Per-user explore filters, kept between interactions for a limited time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_core::FeedbackFilter;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

/// Entries expire this long after their last write.
pub const FILTER_TTL_MINUTES: i64 = 30;
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
pub trait FilterStateStore: Send + Sync {
    /// The live filter for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Option<FeedbackFilter>;
    async fn put(&self, key: &str, filter: FeedbackFilter);
    /// Drops expired entries, returning how many were removed.
    async fn sweep(&self) -> usize;
}

struct Entry {
    filter: FeedbackFilter,
    written_at: DateTime<Utc>,
}

pub struct InMemoryFilterStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl Default for InMemoryFilterStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryFilterStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl: chrono::Duration::minutes(FILTER_TTL_MINUTES),
        }
    }

    fn is_live(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.written_at < self.ttl
    }

    #[cfg(test)]
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl FilterStateStore for InMemoryFilterStore {
    async fn get(&self, key: &str) -> Option<FeedbackFilter> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries.get(key).filter(|entry| self.is_live(entry, now)).map(|entry| entry.filter.clone())
    }

    async fn put(&self, key: &str, filter: FeedbackFilter) {
        let written_at = self.clock.now();
        self.entries.write().await.insert(key.to_owned(), Entry { filter, written_at });
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_live(entry, now));
        before - entries.len()
    }
}

/// Periodically evicts expired filters until the returned task is aborted.
pub fn spawn_sweeper(store: Arc<dyn FilterStateStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.sweep().await;
            if evicted > 0 {
                debug!(event_name = "server.filters.swept", evicted, "expired explore filters evicted");
            }
        }
    })
}
