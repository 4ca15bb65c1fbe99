//! Query cache for the event list.
//!
//! A [`QueryCache`] remembers the last fetched list under the key
//! [`EVENTS_KEY`] and serves it to every part of the UI that asks:
//!
//! - Fresh data (younger than the freshness window) is returned without a
//!   request.
//! - Stale data is returned immediately while one background revalidation
//!   refreshes it.
//! - With no data yet, concurrent callers share a single load.
//!
//! The cache is an explicit object built by the composition root and cloned
//! into whatever needs it; clones share state.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Result;
use crate::gateway::EventGateway;
use crate::record::EventRecord;

/// Key under which the event list is cached.
pub const EVENTS_KEY: &str = "events";

/// Tuning for a [`QueryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// How long fetched data is served without revalidation.
    pub stale_after: Duration,
    /// How many times a failed retryable fetch is repeated.
    pub retries: u32,
    /// Base delay between retries; the n-th retry waits n times this.
    pub retry_delay: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            retries: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl CacheOptions {
    /// Build options from the `[cache]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            stale_after: config.stale_after(),
            retries: config.cache.retries,
            retry_delay: config.retry_delay(),
        }
    }
}

/// What the cache currently knows about the event list.
#[derive(Debug, Clone)]
pub enum QueryState {
    /// Nothing fetched and nothing in flight.
    Idle,
    /// The first load is in flight.
    Loading,
    /// The last load failed and there is no earlier data to fall back on.
    Failed {
        /// Display text of the failure.
        message: String,
    },
    /// Data is available.
    Ready {
        /// The cached records.
        records: Arc<Vec<EventRecord>>,
        /// When the records were fetched.
        fetched_at: DateTime<Utc>,
        /// Whether the freshness window has passed.
        stale: bool,
        /// Whether a refresh is in flight.
        refreshing: bool,
        /// Failure of the most recent refresh, if it failed.
        last_error: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct Snapshot {
    records: Arc<Vec<EventRecord>>,
    fetched_at: DateTime<Utc>,
    loaded: Instant,
}

impl Snapshot {
    fn new(records: Arc<Vec<EventRecord>>) -> Self {
        Self {
            records,
            fetched_at: Utc::now(),
            loaded: Instant::now(),
        }
    }

    fn is_fresh(&self, stale_after: Duration) -> bool {
        self.loaded.elapsed() < stale_after
    }
}

#[derive(Debug, Default)]
struct Slot {
    snapshot: Option<Snapshot>,
    error: Option<String>,
}

/// Marks a load as in flight until dropped, even if the load is cancelled.
struct Fetching(Arc<AtomicBool>);

impl Fetching {
    fn start(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for Fetching {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct CacheInner {
    gateway: Arc<dyn EventGateway>,
    options: CacheOptions,
    slot: RwLock<Slot>,
    fetching: Arc<AtomicBool>,
    inflight: Arc<Mutex<()>>,
}

impl CacheInner {
    async fn current(&self) -> Option<Snapshot> {
        self.slot.read().await.snapshot.clone()
    }

    /// Fetch and store. Callers must hold the in-flight lock.
    async fn load(&self) -> Result<Arc<Vec<EventRecord>>> {
        let _fetching = Fetching::start(&self.fetching);
        let result = fetch_with_retry(self.gateway.as_ref(), &self.options).await;
        self.store(result).await
    }

    async fn store(&self, result: Result<Vec<EventRecord>>) -> Result<Arc<Vec<EventRecord>>> {
        let mut slot = self.slot.write().await;
        match result {
            Ok(records) => {
                let records = Arc::new(records);
                debug!(key = EVENTS_KEY, count = records.len(), "Cached events");
                slot.snapshot = Some(Snapshot::new(Arc::clone(&records)));
                slot.error = None;
                Ok(records)
            }
            Err(e) => {
                slot.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

async fn fetch_with_retry(
    gateway: &dyn EventGateway,
    options: &CacheOptions,
) -> Result<Vec<EventRecord>> {
    let mut attempt = 0;
    loop {
        match gateway.list_events().await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_retryable() && attempt < options.retries => {
                attempt += 1;
                warn!(
                    attempt,
                    retries = options.retries,
                    error = %e,
                    "Fetching events failed, retrying"
                );
                tokio::time::sleep(options.retry_delay * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Shared cache of the event list.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("key", &EVENTS_KEY)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    /// Create an empty cache in front of `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn EventGateway>, options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gateway,
                options,
                slot: RwLock::new(Slot::default()),
                fetching: Arc::new(AtomicBool::new(false)),
                inflight: Arc::new(Mutex::new(())),
            }),
        }
    }

    /// The key the event list is cached under.
    #[must_use]
    pub fn key(&self) -> &'static str {
        EVENTS_KEY
    }

    /// The gateway behind the cache, for writes.
    #[must_use]
    pub fn gateway(&self) -> &dyn EventGateway {
        self.inner.gateway.as_ref()
    }

    /// The options the cache was built with.
    #[must_use]
    pub fn options(&self) -> CacheOptions {
        self.inner.options
    }

    /// The current loading/error/data state.
    pub async fn state(&self) -> QueryState {
        let slot = self.inner.slot.read().await;
        let fetching = self.inner.fetching.load(Ordering::SeqCst);
        match (&slot.snapshot, &slot.error) {
            (Some(snapshot), error) => QueryState::Ready {
                records: Arc::clone(&snapshot.records),
                fetched_at: snapshot.fetched_at,
                stale: !snapshot.is_fresh(self.inner.options.stale_after),
                refreshing: fetching,
                last_error: error.clone(),
            },
            (None, _) if fetching => QueryState::Loading,
            (None, Some(message)) => QueryState::Failed {
                message: message.clone(),
            },
            (None, None) => QueryState::Idle,
        }
    }

    /// Get the event list, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if there is no cached data and loading fails.
    pub async fn fetch(&self) -> Result<Arc<Vec<EventRecord>>> {
        if let Some(snapshot) = self.inner.current().await {
            if snapshot.is_fresh(self.inner.options.stale_after) {
                trace!(key = EVENTS_KEY, "Cache hit");
            } else {
                debug!(key = EVENTS_KEY, "Serving stale events while revalidating");
                self.revalidate_in_background();
            }
            return Ok(snapshot.records);
        }

        let _guard = self.inner.inflight.lock().await;
        // Another caller may have finished loading while this one waited
        if let Some(snapshot) = self.inner.current().await {
            trace!(key = EVENTS_KEY, "Joined an in-flight load");
            return Ok(snapshot.records);
        }

        debug!(key = EVENTS_KEY, "Cache miss");
        self.inner.load().await
    }

    /// Fetch the event list from the gateway regardless of freshness.
    ///
    /// Waits for any load already in flight, then issues a new request, so the
    /// result reflects every write that completed before the call.
    ///
    /// # Errors
    ///
    /// Returns the gateway error. Previously cached data is kept.
    pub async fn refetch(&self) -> Result<Arc<Vec<EventRecord>>> {
        let _guard = self.inner.inflight.lock().await;
        debug!(key = EVENTS_KEY, "Refetching events");
        self.inner.load().await
    }

    /// Forget the last error. Cached data is left alone.
    pub async fn dismiss_error(&self) {
        self.inner.slot.write().await.error = None;
    }

    /// Refresh the cache on a background task.
    ///
    /// Returns `None` if a load is already in flight. The task only holds a
    /// weak reference to the cache, so if every handle is dropped before the
    /// response arrives the response is discarded.
    pub fn revalidate_in_background(&self) -> Option<JoinHandle<()>> {
        let guard = Arc::clone(&self.inner.inflight).try_lock_owned().ok()?;
        let fetching = Fetching::start(&self.inner.fetching);
        let gateway = Arc::clone(&self.inner.gateway);
        let options = self.inner.options;
        let cache: Weak<CacheInner> = Arc::downgrade(&self.inner);

        Some(tokio::spawn(async move {
            let _guard = guard;
            let _fetching = fetching;

            let result = fetch_with_retry(gateway.as_ref(), &options).await;

            match cache.upgrade() {
                Some(inner) => {
                    if let Err(e) = inner.store(result).await {
                        warn!(key = EVENTS_KEY, error = %e, "Background revalidation failed");
                    }
                }
                None => debug!(key = EVENTS_KEY, "Cache dropped, discarding late response"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::logging::init_test_logging;
    use crate::error::Error;
    use crate::gateway::MemoryGateway;

    fn options(stale_after: Duration, retries: u32) -> CacheOptions {
        CacheOptions {
            stale_after,
            retries,
            retry_delay: Duration::ZERO,
        }
    }

    fn gateway() -> Arc<MemoryGateway> {
        Arc::new(MemoryGateway::new([
            EventRecord::new("login").with_description("User signed in"),
            EventRecord::new("logout"),
        ]))
    }

    /// Gateway whose list calls wait for a permit.
    struct GatedGateway {
        inner: MemoryGateway,
        gate: Semaphore,
    }

    #[async_trait]
    impl EventGateway for GatedGateway {
        async fn list_events(&self) -> Result<Vec<EventRecord>> {
            self.gate
                .acquire()
                .await
                .map_err(|_| Error::internal("gate closed"))?
                .forget();
            self.inner.list_events().await
        }

        async fn save_event(&self, record: &EventRecord) -> Result<()> {
            self.inner.save_event(record).await
        }
    }

    #[test]
    fn test_default_options() {
        let options = CacheOptions::default();
        assert_eq!(options.stale_after, Duration::from_secs(300));
        assert_eq!(options.retries, 2);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.cache.stale_after_secs = 10;
        config.cache.retries = 5;
        config.cache.retry_delay_ms = 20;

        let options = CacheOptions::from_config(&config);
        assert_eq!(options.stale_after, Duration::from_secs(10));
        assert_eq!(options.retries, 5);
        assert_eq!(options.retry_delay, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let cache = QueryCache::new(gateway(), CacheOptions::default());
        assert!(matches!(cache.state().await, QueryState::Idle));
        assert_eq!(cache.key(), "events");
    }

    #[tokio::test]
    async fn test_fresh_data_served_without_request() {
        let gateway = gateway();
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));

        let first = cache.fetch().await.unwrap();
        let second = cache.fetch().await.unwrap();

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(gateway.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_load() {
        let gateway = gateway();
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));
        let other = cache.clone();

        let (a, b) = tokio::join!(cache.fetch(), other.fetch());

        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap().len(), 2);
        assert_eq!(gateway.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_data_served_then_revalidated() {
        let gateway = gateway();
        let cache = QueryCache::new(gateway.clone(), options(Duration::ZERO, 0));
        cache.fetch().await.unwrap();

        gateway
            .save_event(&EventRecord::new("logout").with_description("User signed out"))
            .await
            .unwrap();

        // Stale data comes back at once, unchanged
        let stale = cache.fetch().await.unwrap();
        assert!(!stale[1].is_documented());

        for _ in 0..100 {
            if gateway.list_calls() >= 2 {
                if let QueryState::Ready {
                    refreshing: false, ..
                } = cache.state().await
                {
                    break;
                }
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(gateway.list_calls(), 2);
        let QueryState::Ready { records, stale, .. } = cache.state().await else {
            panic!("expected cached data");
        };
        assert!(stale);
        assert!(records[1].is_documented());
    }

    #[tokio::test]
    async fn test_revalidate_skipped_while_loading() {
        let gateway = Arc::new(GatedGateway {
            inner: MemoryGateway::new([EventRecord::new("a")]),
            gate: Semaphore::new(0),
        });
        let cache = QueryCache::new(gateway.clone(), options(Duration::ZERO, 0));

        let first = cache.revalidate_in_background().expect("no load in flight");
        assert!(cache.revalidate_in_background().is_none());

        gateway.gate.add_permits(1);
        first.await.unwrap();
        assert_eq!(gateway.inner.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_late_response_after_drop_is_discarded() {
        let gateway = Arc::new(GatedGateway {
            inner: MemoryGateway::new([EventRecord::new("a")]),
            gate: Semaphore::new(1),
        });
        let cache = QueryCache::new(gateway.clone(), options(Duration::ZERO, 0));
        cache.fetch().await.unwrap();

        let handle = cache.revalidate_in_background().expect("no load in flight");
        drop(cache);
        gateway.gate.add_permits(1);

        handle.await.unwrap();
        assert_eq!(gateway.inner.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        init_test_logging();
        let gateway = gateway();
        gateway.fail_next_lists(2);
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 2));

        let records = cache.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(gateway.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        init_test_logging();
        let gateway = gateway();
        gateway.fail_next_lists(3);
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 2));

        let err = cache.fetch().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(gateway.list_calls(), 3);
        assert!(matches!(cache.state().await, QueryState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_data() {
        init_test_logging();
        let gateway = gateway();
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));
        cache.fetch().await.unwrap();

        gateway.fail_next_lists(1);
        assert!(cache.refetch().await.is_err());

        let QueryState::Ready {
            records,
            last_error,
            refreshing,
            ..
        } = cache.state().await
        else {
            panic!("expected cached data");
        };
        assert_eq!(records.len(), 2);
        assert!(!refreshing);
        assert!(last_error.unwrap().contains("503"));

        cache.dismiss_error().await;
        assert!(matches!(
            cache.state().await,
            QueryState::Ready {
                last_error: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_refetch_always_hits_gateway() {
        let gateway = gateway();
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));

        cache.fetch().await.unwrap();
        cache.refetch().await.unwrap();
        assert_eq!(gateway.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_first_load_is_not_left_loading() {
        init_test_logging();
        let gateway = Arc::new(GatedGateway {
            inner: MemoryGateway::new([EventRecord::new("a")]),
            gate: Semaphore::new(0),
        });
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));

        let result = tokio::time::timeout(Duration::from_millis(20), cache.fetch()).await;
        assert!(result.is_err());
        assert!(matches!(cache.state().await, QueryState::Idle));

        // A later load is not blocked by the cancelled one
        gateway.gate.add_permits(1);
        assert_eq!(cache.fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_refetch_clears_refreshing() {
        let gateway = Arc::new(GatedGateway {
            inner: MemoryGateway::new([EventRecord::new("a")]),
            gate: Semaphore::new(1),
        });
        let cache = QueryCache::new(gateway.clone(), options(Duration::from_secs(300), 0));
        cache.fetch().await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(20), cache.refetch()).await;
        assert!(result.is_err());
        assert!(matches!(
            cache.state().await,
            QueryState::Ready {
                refreshing: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_aborted_revalidation_clears_refreshing() {
        init_test_logging();
        let gateway = Arc::new(GatedGateway {
            inner: MemoryGateway::new([EventRecord::new("a")]),
            gate: Semaphore::new(1),
        });
        let cache = QueryCache::new(gateway.clone(), options(Duration::ZERO, 0));
        cache.fetch().await.unwrap();

        let handle = cache.revalidate_in_background().expect("no load in flight");
        assert!(matches!(
            cache.state().await,
            QueryState::Ready {
                refreshing: true,
                ..
            }
        ));

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(matches!(
            cache.state().await,
            QueryState::Ready {
                refreshing: false,
                ..
            }
        ));
        assert!(cache.revalidate_in_background().is_some());
    }

    #[test]
    fn test_debug_output() {
        let cache = QueryCache::new(gateway(), CacheOptions::default());
        assert!(format!("{cache:?}").contains("events"));
    }
}
