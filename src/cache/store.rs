//! TTL- and capacity-bounded response store.

use super::key::CacheKey;
use crate::clock::Clock;
use crate::transport::HttpResponse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    response: HttpResponse,
    cached_at: Instant,
    // Insertion order breaks ties between entries stored at the same instant.
    seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub expirations: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Entries removed by one [`ResponseCache::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
}

/// In-memory store of successful GET responses.
///
/// Expired entries read as absent immediately but are only removed by
/// [`sweep`](Self::sweep). Capacity is policed oldest-first by `cached_at`.
pub struct ResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
    next_seq: AtomicU64,
    stats: AtomicStats,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            next_seq: AtomicU64::new(0),
            stats: AtomicStats::default(),
            clock,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.cached_at) > self.ttl
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<HttpResponse> {
        let now = self.clock.now();
        let hit = self
            .read()
            .get(key)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.response.clone());
        if hit.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Insert or overwrite. Capacity is enforced before returning.
    pub fn store(&self, key: CacheKey, response: HttpResponse) {
        let entry = CacheEntry {
            response,
            cached_at: self.clock.now(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        let mut entries = self.write();
        entries.insert(key, entry);
        self.stats.stores.fetch_add(1, Ordering::Relaxed);
        self.evict_overflow_locked(&mut entries);
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.write().remove(key).is_some()
    }

    /// Remove expired entries, then trim to capacity.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| !self.is_expired(e, now));
        let expired = before - entries.len();
        self.stats
            .expirations
            .fetch_add(expired as u64, Ordering::Relaxed);
        let evicted = self.evict_overflow_locked(&mut entries);

        if expired + evicted > 0 {
            debug!(expired, evicted, remaining = entries.len(), "response cache swept");
        }
        SweepReport { expired, evicted }
    }

    /// Capacity policing only, independent of TTL.
    pub fn evict_overflow(&self) -> usize {
        self.evict_overflow_locked(&mut self.write())
    }

    fn evict_overflow_locked(&self, entries: &mut HashMap<CacheKey, CacheEntry>) -> usize {
        if entries.len() <= self.max_entries {
            return 0;
        }
        let overflow = entries.len() - self.max_entries;
        let mut by_age: Vec<(Instant, u64, CacheKey)> = entries
            .iter()
            .map(|(k, e)| (e.cached_at, e.seq, k.clone()))
            .collect();
        by_age.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        for (_, _, key) in by_age.into_iter().take(overflow) {
            entries.remove(&key);
        }
        self.stats
            .evictions
            .fetch_add(overflow as u64, Ordering::Relaxed);
        overflow
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read().contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn cache(ttl_mins: u64, max: usize) -> (ResponseCache, MockClock) {
        let clock = MockClock::new();
        let cache = ResponseCache::new(
            Duration::from_secs(ttl_mins * 60),
            max,
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    fn resp(body: &str) -> HttpResponse {
        HttpResponse::new(200, body.to_string())
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let (cache, _) = cache(5, 10);
        let key = CacheKey::from("a");
        assert!(cache.lookup(&key).is_none());
        cache.store(key.clone(), resp("A"));
        assert_eq!(cache.lookup(&key).unwrap().text(), "A");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 1);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lazy_expiry_then_sweep() {
        let (cache, clock) = cache(5, 10);
        let key = CacheKey::from("a");
        cache.store(key.clone(), resp("A"));

        clock.advance(Duration::from_secs(5 * 60));
        assert!(cache.lookup(&key).is_some(), "exactly TTL old is still fresh");

        clock.advance(Duration::from_secs(1));
        assert!(cache.lookup(&key).is_none());
        assert!(cache.contains(&key), "expired entry stays until swept");

        let report = cache.sweep();
        assert_eq!(report.expired, 1);
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_store_overwrites_existing_key() {
        let (cache, clock) = cache(5, 10);
        let key = CacheKey::from("a");
        cache.store(key.clone(), resp("old"));
        clock.advance(Duration::from_secs(4 * 60));
        cache.store(key.clone(), resp("new"));
        clock.advance(Duration::from_secs(2 * 60));

        // Overwrite refreshed cached_at as well as the payload.
        assert_eq!(cache.lookup(&key).unwrap().text(), "new");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let (cache, clock) = cache(10, 2);
        cache.store(CacheKey::from("A"), resp("A"));
        clock.advance(Duration::from_secs(60));
        cache.store(CacheKey::from("B"), resp("B"));
        clock.advance(Duration::from_secs(60));
        cache.store(CacheKey::from("C"), resp("C"));
        clock.advance(Duration::from_secs(60));

        cache.sweep();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&CacheKey::from("A")));
        assert!(cache.contains(&CacheKey::from("B")));
        assert!(cache.contains(&CacheKey::from("C")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_same_instant_ties_follow_insertion_order() {
        let (cache, _) = cache(10, 3);
        for k in ["k1", "k2", "k3", "k4", "k5"] {
            cache.store(CacheKey::from(k), resp(k));
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&CacheKey::from("k1")));
        assert!(!cache.contains(&CacheKey::from("k2")));
        assert!(cache.contains(&CacheKey::from("k5")));
        assert_eq!(cache.evict_overflow(), 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (cache, _) = cache(5, 10);
        cache.store(CacheKey::from("a"), resp("A"));
        cache.store(CacheKey::from("b"), resp("B"));
        assert!(cache.invalidate(&CacheKey::from("a")));
        assert!(!cache.invalidate(&CacheKey::from("a")));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keeps_working_after_lock_poisoning() {
        let (cache, _) = cache(5, 10);
        cache.store(CacheKey::from("a"), resp("A"));
        std::thread::scope(|s| {
            let writer = s.spawn(|| {
                let _entries = cache.entries.write().unwrap();
                panic!("writer died holding the lock");
            });
            assert!(writer.join().is_err());
        });
        assert!(cache.entries.is_poisoned());

        assert_eq!(cache.lookup(&CacheKey::from("a")).unwrap().text(), "A");
        cache.store(CacheKey::from("b"), resp("B"));
        assert!(cache.contains(&CacheKey::from("b")));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.sweep(), SweepReport::default());
        assert!(cache.invalidate(&CacheKey::from("a")));
    }
}
