use anyhow::{Result, anyhow};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// Errors are kept as rendered strings so every waiter can get its own copy.
type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, String>>>;

struct CacheEntry<V> {
    value: Option<V>,
    pending: Option<SharedFetch<V>>,
    /// `None` when `now + ttl` overflows, i.e. never expires.
    expires_at: Option<Instant>,
    generation: u64,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    next_generation: u64,
}

/// Time-bounded cache that also collapses concurrent fetches for the same key.
///
/// A value is served while its entry is fresh. While a fetch for a key is in
/// flight, other callers for that key wait on the same fetch instead of
/// starting their own. The fetch runs as a separate tokio task, so it completes
/// and records its result even if every caller stops waiting.
#[derive(Clone)]
pub struct FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<CacheState<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 0,
            })),
            clock,
        }
    }

    /// Returns the cached value for `key`, joins an in-flight fetch, or runs
    /// `fetcher` once and caches its result for `ttl`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetcher: F, ttl: Duration) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let shared = {
            let mut state = self.inner.lock().await;
            let now = self.clock.now();

            let existing = match state.entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    if let Some(value) = &entry.value {
                        debug!(key, "Cache HIT");
                        return Ok(value.clone());
                    }
                    entry.pending.clone()
                }
                _ => None,
            };

            match existing {
                Some(pending) => {
                    debug!(key, "Cache JOIN in-flight fetch");
                    pending
                }
                None => {
                    debug!(key, "Cache MISS");
                    state.next_generation += 1;
                    let generation = state.next_generation;
                    let shared = self.spawn_fetch(key, generation, fetcher());
                    state.entries.insert(
                        key.to_string(),
                        CacheEntry {
                            value: None,
                            pending: Some(shared.clone()),
                            expires_at: now.checked_add(ttl),
                            generation,
                        },
                    );
                    shared
                }
            }
        };

        shared.await.map_err(|e| anyhow!(e))
    }

    fn spawn_fetch<Fut>(&self, key: &str, generation: u64, fut: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();

        let handle = tokio::spawn(async move {
            let result = fut.await.map_err(|e| format!("{e:#}"));

            let mut state = inner.lock().await;
            // A newer fetch may have replaced this entry; only settle our own.
            if let Some(entry) = state.entries.get_mut(&key) {
                if entry.generation == generation {
                    entry.pending = None;
                    match &result {
                        Ok(value) => {
                            debug!(key = %key, "Cache PUT");
                            entry.value = Some(value.clone());
                        }
                        Err(e) => debug!(key = %key, error = %e, "Fetch failed, nothing cached"),
                    }
                }
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(format!("Fetch task failed: {e}")),
            }
        }
        .boxed()
        .shared()
    }

    pub async fn invalidate(&self, key: &str) {
        let mut state = self.inner.lock().await;
        state.entries.remove(key);
        debug!(key, "Cache REMOVE");
    }

    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        state.entries.clear();
        debug!("Cache CLEAR");
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> Default for FetchCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_secs(30);

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        value: i32,
    ) -> impl Future<Output = Result<i32>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test]
    async fn test_cached_value_served_without_fetch() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 1), TTL)
            .await
            .unwrap();
        let second = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 2), TTL)
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_fetch() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                Ok(42)
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("trends:EUR:daily", slow, TTL),
            cache.get_or_fetch("trends:EUR:daily", || counting_fetch(&calls, 7), TTL),
        );

        assert_eq!(a.unwrap(), 42);
        assert_eq!(b.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_fetch_independently() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let eur = cache
            .get_or_fetch("trends:EUR:daily", || counting_fetch(&calls, 1), TTL)
            .await
            .unwrap();
        let gbp = cache
            .get_or_fetch("trends:GBP:daily", || counting_fetch(&calls, 2), TTL)
            .await
            .unwrap();

        assert_eq!((eur, gbp), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_exactly_one_refetch() {
        let clock = Arc::new(ManualClock::new());
        let cache = FetchCache::<i32>::with_clock(clock.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 1), TTL)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(29));
        let still_cached = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 2), TTL)
            .await
            .unwrap();
        assert_eq!(still_cached, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Expiry is exclusive: an entry is stale at exactly now == expires_at.
        clock.advance(Duration::from_secs(1));
        let refreshed = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 3), TTL)
            .await
            .unwrap();
        let cached_again = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 4), TTL)
            .await
            .unwrap();

        assert_eq!(refreshed, 3);
        assert_eq!(cached_again, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let clock = Arc::new(ManualClock::new());
        let cache = FetchCache::<i32>::with_clock(clock);
        let calls = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let value = cache
                .get_or_fetch("rates:current", || counting_fetch(&calls, i), Duration::ZERO)
                .await
                .unwrap();
            assert_eq!(value, i);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("connection refused"))
            }
        };

        let err = cache
            .get_or_fetch("rates:current", failing, TTL)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));

        let value = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 5), TTL)
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_observe_same_failure() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(20)).await;
                Err(anyhow!("status 500"))
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("rates:current", failing, TTL),
            cache.get_or_fetch("rates:current", || counting_fetch(&calls, 1), TTL),
        );

        assert!(a.unwrap_err().to_string().contains("status 500"));
        assert!(b.unwrap_err().to_string().contains("status 500"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_populates_cache() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(30)).await;
                Ok(9)
            }
        };

        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            cache.get_or_fetch("rates:current", slow, TTL),
        )
        .await;
        assert!(abandoned.is_err());

        sleep(Duration::from_millis(60)).await;
        let value = cache
            .get_or_fetch("rates:current", || counting_fetch(&calls, 1), TTL)
            .await
            .unwrap();
        assert_eq!(value, 9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = FetchCache::<i32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_fetch("a", || counting_fetch(&calls, 1), TTL)
            .await
            .unwrap();
        cache
            .get_or_fetch("b", || counting_fetch(&calls, 2), TTL)
            .await
            .unwrap();

        cache.invalidate("a").await;
        assert_eq!(cache.len().await, 1);
        let value = cache
            .get_or_fetch("a", || counting_fetch(&calls, 3), TTL)
            .await
            .unwrap();
        assert_eq!(value, 3);

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
