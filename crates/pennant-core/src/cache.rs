// Time-to-live cache with an injected clock.
//
// Entries are recomputed on demand when they are missing, older than the
// TTL, or stamped in the future relative to the clock (wall clock moved
// backwards). Failed recomputations are never stored.

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Used by tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *lock(&self.now) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value for `key` if it is still within the TTL.
    pub fn get_fresh(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = lock(&self.entries);
        let entry = entries.get(key)?;
        self.is_fresh(entry.stored_at, now).then(|| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        lock(&self.entries).insert(key, Entry { value, stored_at });
    }

    pub fn invalidate(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    /// Return the fresh cached value for `key`, or run `recompute` and store
    /// its result. The lock is not held while `recompute` runs, so two
    /// concurrent callers on a stale key may both recompute; the later
    /// insert wins.
    pub async fn get_or_recompute<F, Fut, E>(&self, key: K, recompute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get_fresh(&key) {
            return Ok(value);
        }
        debug!(ttl_secs = self.ttl.as_secs(), "cache miss, recomputing");
        let value = recompute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// `get_or_recompute` for computations that cannot fail.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let result = self
            .get_or_recompute(key, move || async move { Ok::<V, Infallible>(compute().await) })
            .await;
        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match (now - stored_at).to_std() {
            Ok(age) => age < self.ttl,
            // Negative age: the clock went backwards.
            Err(_) => false,
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 30, 12, 0, 0).unwrap()
    }

    fn cache(clock: &Arc<ManualClock>, ttl_secs: u64) -> TtlCache<&'static str, u32> {
        TtlCache::new(Duration::from_secs(ttl_secs), clock.clone())
    }

    #[test]
    fn fresh_until_ttl_elapses() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 60);
        cache.insert("rows", 7);

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get_fresh(&"rows"), Some(7));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get_fresh(&"rows"), None);
    }

    #[test]
    fn backwards_clock_counts_as_stale() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 60);
        cache.insert("rows", 1);
        clock.set(start() - chrono::Duration::seconds(5));
        assert_eq!(cache.get_fresh(&"rows"), None);
    }

    #[test]
    fn invalidate_drops_entry() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 60);
        cache.insert("rows", 1);
        cache.invalidate(&"rows");
        assert_eq!(cache.get_fresh(&"rows"), None);
    }

    #[tokio::test]
    async fn get_or_recompute_only_recomputes_when_stale() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 30);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move {
            Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as u32 + 100)
        };

        assert_eq!(cache.get_or_recompute("today", compute).await, Ok(100));
        assert_eq!(cache.get_or_recompute("today", compute).await, Ok(100));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get_or_recompute("today", compute).await, Ok(101));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 30);

        let failed = cache
            .get_or_recompute("today", || async { Err::<u32, _>("boom") })
            .await;
        assert_eq!(failed, Err("boom"));
        assert_eq!(cache.get_fresh(&"today"), None);

        let ok = cache
            .get_or_recompute("today", || async { Ok::<_, &str>(5) })
            .await;
        assert_eq!(ok, Ok(5));
    }

    #[tokio::test]
    async fn get_or_compute_serves_fresh_values() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&clock, 60);
        assert_eq!(cache.get_or_compute("rows", || async { 1 }).await, 1);
        assert_eq!(cache.get_or_compute("rows", || async { 2 }).await, 1);
        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get_or_compute("rows", || async { 3 }).await, 3);
    }
}
