/// Time-windowed, capacity-bounded digest memory.
///
/// Two instances exist per service: one keyed on whole-file digests (long
/// window, small capacity) and one keyed on row identity digests (short
/// window, large capacity). Both are shared across request threads, so all
/// state sits behind a single `parking_lot::Mutex` and every public method
/// is one critical section. Check-then-record sequences that must be atomic
/// go through [`HashCache::record_if_new`] or [`HashCache::try_claim`].
///
/// # Eviction
///
/// Inserting a new digest into a full cache first purges every entry older
/// than the window. If the cache is still full, exactly one entry is evicted:
/// the one with the oldest `last_seen`, ties broken by the lowest digest.
///
/// An ordered `(last_seen, digest)` index is kept beside the map, so both
/// purging and eviction pop from its front instead of sweeping every entry.
use super::digest::Digest;
use crate::config::CacheConfig;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Snapshot of a cache's occupancy, attached to report metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub capacity: usize,
    pub window_hours: u32,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Result of trying to claim a digest for processing, or of checking one
/// with [`HashCache::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The digest was not recent and is now held as in-flight.
    Claimed,
    /// The digest was recorded within the window.
    Recent { remaining: Duration },
    /// Another caller currently holds a claim on the same digest.
    InFlight,
}

#[derive(Default)]
struct CacheInner {
    /// digest -> last seen
    entries: HashMap<Digest, DateTime<Utc>>,
    /// Same entries ordered oldest first.
    by_age: BTreeSet<(DateTime<Utc>, Digest)>,
    /// Digests claimed but not yet recorded or released.
    in_flight: HashSet<Digest>,
    last_cleanup: Option<DateTime<Utc>>,
}

pub struct HashCache {
    label: &'static str,
    capacity: usize,
    window_hours: u32,
    window: TimeDelta,
    inner: Mutex<CacheInner>,
}

impl HashCache {
    /// Create a cache holding at most `capacity` digests for `window_hours`.
    ///
    /// `label` only appears in log lines.
    pub fn new(label: &'static str, capacity: usize, window_hours: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            label,
            capacity,
            window_hours,
            window: TimeDelta::hours(i64::from(window_hours)),
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity.min(4_096)),
                ..CacheInner::default()
            }),
        }
    }

    pub fn from_config(label: &'static str, config: &CacheConfig) -> Self {
        Self::new(label, config.capacity, config.window_hours)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window_hours(&self) -> u32 {
        self.window_hours
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` iff `digest` is present and was seen within the window.
    pub fn is_recent(&self, digest: &Digest) -> bool {
        self.is_recent_at(digest, Utc::now())
    }

    pub fn is_recent_at(&self, digest: &Digest, now: DateTime<Utc>) -> bool {
        let inner = self.inner.lock();
        Self::recent_in(&inner, digest, now, self.window)
    }

    /// Time left before `digest` stops counting as recent, if it is recent.
    pub fn remaining(&self, digest: &Digest) -> Option<Duration> {
        self.remaining_at(digest, Utc::now())
    }

    pub fn remaining_at(&self, digest: &Digest, now: DateTime<Utc>) -> Option<Duration> {
        let inner = self.inner.lock();
        self.remaining_in(&inner, digest, now)
    }

    /// Non-claiming admission check.
    ///
    /// Returns `None` if a claim would succeed right now, otherwise the
    /// reason it would not. Nothing is recorded or claimed.
    pub fn check(&self, digest: &Digest) -> Option<Admission> {
        self.check_at(digest, Utc::now())
    }

    pub fn check_at(&self, digest: &Digest, now: DateTime<Utc>) -> Option<Admission> {
        let inner = self.inner.lock();
        if let Some(remaining) = self.remaining_in(&inner, digest, now) {
            return Some(Admission::Recent { remaining });
        }
        inner.in_flight.contains(digest).then_some(Admission::InFlight)
    }

    /// Insert `digest`, or refresh its timestamp if already present.
    pub fn record(&self, digest: Digest) {
        self.record_at(digest, Utc::now());
    }

    pub fn record_at(&self, digest: Digest, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, digest, now);
    }

    /// Atomic check-and-record.
    ///
    /// Returns `false` (and leaves the entry untouched) if `digest` is
    /// recent; otherwise records it and returns `true`.
    pub fn record_if_new(&self, digest: Digest) -> bool {
        self.record_if_new_at(digest, Utc::now())
    }

    pub fn record_if_new_at(&self, digest: Digest, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock();
        if Self::recent_in(&inner, &digest, now, self.window) {
            return false;
        }
        self.insert_locked(&mut inner, digest, now);
        true
    }

    /// Claim `digest` for processing without recording it.
    ///
    /// A claim blocks concurrent claims of the same digest until it is
    /// committed with [`HashCache::commit`] or dropped with
    /// [`HashCache::release`]. Recording only on commit keeps a failed run
    /// from marking the digest as seen.
    pub fn try_claim(&self, digest: Digest) -> Admission {
        self.try_claim_at(digest, Utc::now())
    }

    pub fn try_claim_at(&self, digest: Digest, now: DateTime<Utc>) -> Admission {
        let mut inner = self.inner.lock();
        if let Some(remaining) = self.remaining_in(&inner, &digest, now) {
            return Admission::Recent { remaining };
        }
        if !inner.in_flight.insert(digest) {
            return Admission::InFlight;
        }
        Admission::Claimed
    }

    /// Record a claimed digest and drop the claim in one step.
    pub fn commit(&self, digest: Digest) {
        self.commit_at(digest, Utc::now());
    }

    pub fn commit_at(&self, digest: Digest, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&digest);
        self.insert_locked(&mut inner, digest, now);
    }

    /// Drop a claim without recording the digest.
    pub fn release(&self, digest: &Digest) {
        self.inner.lock().in_flight.remove(digest);
    }

    /// Purge every entry older than the window. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock();
        self.purge_expired(&mut inner, now)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            count: inner.entries.len(),
            capacity: self.capacity,
            window_hours: self.window_hours,
            last_cleanup: inner.last_cleanup,
        }
    }

    // ── internals (caller holds the lock) ──────────────────────────────────

    fn recent_in(
        inner: &CacheInner,
        digest: &Digest,
        now: DateTime<Utc>,
        window: TimeDelta,
    ) -> bool {
        inner
            .entries
            .get(digest)
            .is_some_and(|&seen| now.signed_duration_since(seen) <= window)
    }

    fn remaining_in(
        &self,
        inner: &CacheInner,
        digest: &Digest,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let seen = *inner.entries.get(digest)?;
        let age = now.signed_duration_since(seen);
        if age > self.window {
            return None;
        }
        // A clock that stepped backwards yields a negative age; clamp the
        // remaining time to the window.
        let left = (self.window - age).min(self.window);
        Some(left.to_std().unwrap_or(Duration::ZERO))
    }

    fn insert_locked(&self, inner: &mut CacheInner, digest: Digest, now: DateTime<Utc>) {
        if let Some(seen) = inner.entries.get_mut(&digest) {
            let previous = std::mem::replace(seen, now);
            inner.by_age.remove(&(previous, digest));
            inner.by_age.insert((now, digest));
            return;
        }
        if inner.entries.len() >= self.capacity {
            self.purge_expired(inner, now);
        }
        if inner.entries.len() >= self.capacity {
            self.evict_oldest(inner);
        }
        inner.entries.insert(digest, now);
        inner.by_age.insert((now, digest));
    }

    fn purge_expired(&self, inner: &mut CacheInner, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while let Some(&(seen, digest)) = inner.by_age.first() {
            if now.signed_duration_since(seen) <= self.window {
                break;
            }
            inner.by_age.pop_first();
            inner.entries.remove(&digest);
            removed += 1;
        }
        inner.last_cleanup = Some(now);
        if removed > 0 {
            debug!(cache = self.label, removed, "Purged expired digests");
        }
        removed
    }

    fn evict_oldest(&self, inner: &mut CacheInner) {
        if let Some((_, digest)) = inner.by_age.pop_first() {
            inner.entries.remove(&digest);
            debug!(cache = self.label, ?digest, "Evicted oldest digest at capacity");
        }
    }
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("window_hours", &self.window_hours)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::compute_digest;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    }

    fn d(n: u32) -> Digest {
        compute_digest(&n.to_le_bytes())
    }

    #[test]
    fn unknown_digest_is_not_recent() {
        let cache = HashCache::new("test", 10, 1);
        assert!(!cache.is_recent_at(&d(1), t0()));
    }

    #[test]
    fn recent_until_window_boundary() {
        let cache = HashCache::new("test", 10, 24);
        cache.record_at(d(1), t0());

        let window = TimeDelta::hours(24);
        let eps = TimeDelta::seconds(1);
        assert!(cache.is_recent_at(&d(1), t0() + window - eps));
        assert!(cache.is_recent_at(&d(1), t0() + window));
        assert!(!cache.is_recent_at(&d(1), t0() + window + eps));
    }

    #[test]
    fn record_refreshes_existing_timestamp() {
        let cache = HashCache::new("test", 10, 1);
        cache.record_at(d(1), t0());
        cache.record_at(d(1), t0() + TimeDelta::minutes(50));
        assert!(cache.is_recent_at(&d(1), t0() + TimeDelta::minutes(100)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn record_if_new_rejects_recent_digest() {
        let cache = HashCache::new("test", 10, 1);
        assert!(cache.record_if_new_at(d(1), t0()));
        assert!(!cache.record_if_new_at(d(1), t0() + TimeDelta::minutes(30)));
        // The rejected call must not have refreshed the entry.
        assert!(!cache.is_recent_at(&d(1), t0() + TimeDelta::minutes(61)));
    }

    #[test]
    fn record_if_new_accepts_expired_digest() {
        let cache = HashCache::new("test", 10, 1);
        assert!(cache.record_if_new_at(d(1), t0()));
        assert!(cache.record_if_new_at(d(1), t0() + TimeDelta::hours(2)));
    }

    /// Filling past capacity with no expired entries evicts exactly the
    /// single oldest entry.
    #[test]
    fn capacity_eviction_removes_only_oldest() {
        let cache = HashCache::new("test", 3, 24);
        for i in 0..3u32 {
            cache.record_at(d(i), t0() + TimeDelta::seconds(i64::from(i)));
        }
        cache.record_at(d(3), t0() + TimeDelta::seconds(3));

        let now = t0() + TimeDelta::seconds(4);
        assert_eq!(cache.len(), 3);
        assert!(!cache.is_recent_at(&d(0), now), "oldest must be evicted");
        for i in 1..=3u32 {
            assert!(cache.is_recent_at(&d(i), now), "digest {i} must survive");
        }
    }

    #[test]
    fn expired_entries_are_purged_before_eviction() {
        let cache = HashCache::new("test", 3, 1);
        cache.record_at(d(0), t0());
        cache.record_at(d(1), t0());
        cache.record_at(d(2), t0() + TimeDelta::minutes(90));

        let later = t0() + TimeDelta::minutes(100);
        cache.record_at(d(3), later);

        assert_eq!(cache.len(), 2, "both expired entries purged, none evicted");
        assert!(cache.is_recent_at(&d(2), later));
        assert!(cache.is_recent_at(&d(3), later));
        assert_eq!(cache.stats().last_cleanup, Some(later));
    }

    #[test]
    fn eviction_tie_breaks_on_lowest_digest() {
        let cache = HashCache::new("test", 2, 24);
        let (a, b) = (d(10), d(20));
        cache.record_at(a, t0());
        cache.record_at(b, t0());
        cache.record_at(d(30), t0());

        let lowest = a.min(b);
        let survivor = a.max(b);
        assert!(!cache.is_recent_at(&lowest, t0()));
        assert!(cache.is_recent_at(&survivor, t0()));
    }

    #[test]
    fn refresh_at_capacity_does_not_evict() {
        let cache = HashCache::new("test", 2, 24);
        cache.record_at(d(1), t0());
        cache.record_at(d(2), t0());
        cache.record_at(d(1), t0() + TimeDelta::seconds(5));
        assert_eq!(cache.len(), 2);
        assert!(cache.is_recent_at(&d(2), t0()));
    }

    #[test]
    fn claims_block_concurrent_claims_until_released() {
        let cache = HashCache::new("test", 10, 24);
        assert_eq!(cache.try_claim_at(d(1), t0()), Admission::Claimed);
        assert_eq!(cache.try_claim_at(d(1), t0()), Admission::InFlight);
        cache.release(&d(1));
        assert!(!cache.is_recent_at(&d(1), t0()), "release must not record");
        assert_eq!(cache.try_claim_at(d(1), t0()), Admission::Claimed);
    }

    #[test]
    fn commit_records_and_reports_remaining_window() {
        let cache = HashCache::new("test", 10, 24);
        assert_eq!(cache.try_claim_at(d(1), t0()), Admission::Claimed);
        cache.commit_at(d(1), t0());

        let later = t0() + TimeDelta::hours(20);
        assert_eq!(
            cache.try_claim_at(d(1), later),
            Admission::Recent {
                remaining: Duration::from_secs(4 * 3600)
            }
        );
    }

    #[test]
    fn cleanup_stamps_stats() {
        let cache = HashCache::new("test", 10, 1);
        cache.record_at(d(1), t0());
        assert_eq!(cache.stats().last_cleanup, None);

        let removed = cache.cleanup_at(t0() + TimeDelta::hours(2));
        assert_eq!(removed, 1);
        let stats = cache.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.window_hours, 1);
        assert!(stats.last_cleanup.is_some());
    }

    /// Map and age index hold the same entries after refreshes, purges
    /// and evictions at capacity.
    fn assert_index_consistent(cache: &HashCache) {
        let inner = cache.inner.lock();
        assert_eq!(inner.entries.len(), inner.by_age.len());
        for &(seen, digest) in &inner.by_age {
            assert_eq!(inner.entries.get(&digest), Some(&seen));
        }
    }

    #[test]
    fn index_stays_consistent_when_inserting_past_capacity() {
        let cache = HashCache::new("test", 64, 1);
        for i in 0..1_000u32 {
            let now = t0() + TimeDelta::seconds(i64::from(i));
            cache.record_at(d(i), now);
            // Refresh an older, still-present digest now and then.
            if i % 7 == 0 && i >= 10 {
                cache.record_at(d(i - 10), now);
            }
        }
        assert_eq!(cache.len(), 64);
        assert_index_consistent(&cache);

        // Well past the window, one insert at capacity purges everything.
        cache.record_at(d(5_000), t0() + TimeDelta::hours(3));
        assert_eq!(cache.len(), 1);
        assert_index_consistent(&cache);
    }

    #[test]
    fn eviction_at_capacity_stays_cheap() {
        let capacity = 50_000;
        let cache = HashCache::new("test", capacity, 24);
        for i in 0..capacity as u32 {
            cache.record_at(d(i), t0());
        }
        let started = std::time::Instant::now();
        for i in 0..20_000u32 {
            cache.record_at(d(capacity as u32 + i), t0() + TimeDelta::seconds(1));
        }
        assert_eq!(cache.len(), capacity);
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "20k inserts at capacity took {:?}",
            started.elapsed()
        );
        assert_index_consistent(&cache);
    }

    #[test]
    fn check_reports_without_claiming() {
        let cache = HashCache::new("test", 10, 24);
        assert_eq!(cache.check_at(&d(1), t0()), None);
        assert_eq!(cache.try_claim_at(d(1), t0()), Admission::Claimed);
        assert_eq!(cache.check_at(&d(1), t0()), Some(Admission::InFlight));
        cache.commit_at(d(1), t0());
        assert_eq!(
            cache.check_at(&d(1), t0() + TimeDelta::hours(23)),
            Some(Admission::Recent {
                remaining: Duration::from_secs(3600)
            })
        );
        assert_eq!(cache.check_at(&d(2), t0()), None);
        assert_eq!(cache.try_claim_at(d(2), t0()), Admission::Claimed, "check never claims");
    }

    #[test]
    fn concurrent_record_if_new_admits_once() {
        use std::sync::Arc;

        let cache = Arc::new(HashCache::new("test", 100, 24));
        let digest = d(42);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.record_if_new(digest))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
