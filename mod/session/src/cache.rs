//! In-process TTL cache for revocation lookups.
//!
//! Keyed by (subject, session epoch). Entries are never trusted past the
//! TTL; a subject's whole bucket is dropped synchronously after a new
//! revocation event for that subject is persisted. Sweeping piggybacks on
//! reads behind a single shared last-swept instant, so eviction timing is
//! a deterministic threshold rather than a random sample.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Default entry TTL: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Minimum interval between opportunistic sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    revoked: bool,
    cached_at: Instant,
}

/// A fresh cache hit.
#[derive(Debug, Clone, Copy)]
pub struct CacheHit {
    pub revoked: bool,
    pub age: Duration,
}

/// Concurrent TTL cache: subject → session epoch → entry.
///
/// The nested layout makes per-subject invalidation a single map removal.
/// No lock is ever held across I/O; every operation holds the lock for a
/// bounded in-memory walk at most.
pub struct RevocationCache {
    ttl: Duration,
    sweep_interval: Duration,
    entries: RwLock<HashMap<String, HashMap<String, CacheEntry>>>,
    last_sweep: Mutex<Instant>,
}

impl RevocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_sweep_interval(ttl, SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            ttl,
            sweep_interval,
            entries: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Look up an entry. Returns a miss if absent or at/past the TTL; a
    /// stale hit is deleted as a side effect.
    pub fn get(&self, subject: &str, epoch: &str) -> Option<CacheHit> {
        self.maybe_sweep(Instant::now());

        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap();
            let entry = entries.get(subject)?.get(epoch)?;
            let age = now.duration_since(entry.cached_at);
            if age < self.ttl {
                return Some(CacheHit {
                    revoked: entry.revoked,
                    age,
                });
            }
        }

        // Stale: drop it, re-checking freshness under the write lock in
        // case a concurrent put refreshed the entry between locks.
        let mut entries = self.entries.write().unwrap();
        if let Some(bucket) = entries.get_mut(subject) {
            let still_stale = bucket
                .get(epoch)
                .is_some_and(|e| now.duration_since(e.cached_at) >= self.ttl);
            if still_stale {
                bucket.remove(epoch);
                if bucket.is_empty() {
                    entries.remove(subject);
                }
            }
        }
        None
    }

    /// Upsert an entry with the current timestamp. A single-entry atomic
    /// write — cancellation can never leave it half-applied.
    pub fn put(&self, subject: &str, epoch: &str, revoked: bool) {
        let mut entries = self.entries.write().unwrap();
        entries.entry(subject.to_string()).or_default().insert(
            epoch.to_string(),
            CacheEntry {
                revoked,
                cached_at: Instant::now(),
            },
        );
    }

    /// Remove every entry for a subject. Called synchronously after a
    /// revocation event for the subject is durably persisted, before the
    /// write is acknowledged — this closes the race where a concurrent
    /// reader caches a stale "not revoked".
    pub fn invalidate_subject(&self, subject: &str) {
        self.entries.write().unwrap().remove(subject);
    }

    /// Remove entries older than the TTL.
    pub fn sweep(&self, now: Instant) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|_, bucket| {
            bucket.retain(|_, e| now.duration_since(e.cached_at) < self.ttl);
            !bucket.is_empty()
        });
    }

    /// Sweep if the throttle interval elapsed since the last sweep. A
    /// redundant sweep from a racing reader is harmless.
    fn maybe_sweep(&self, now: Instant) {
        {
            let mut last = self.last_sweep.lock().unwrap();
            if now.duration_since(*last) < self.sweep_interval {
                return;
            }
            *last = now;
        }
        self.sweep(now);
    }

    /// Number of cached entries across all subjects.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RevocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
