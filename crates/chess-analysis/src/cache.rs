//! Bounded, time-expiring cache of analysis results.
//!
//! Entries are keyed by position and depth. An entry older than the TTL is
//! treated as absent even before a sweep physically removes it. When the
//! cache is full, new keys are simply not stored; nothing is evicted to make
//! room.

use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::evaluation::AnalysisResult;

/// Default maximum number of cached results.
pub const DEFAULT_CAPACITY: usize = 100;
/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Shortest interval a sweeper will wait between sweeps.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Source of "now" for entry ages.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Cache key: position plus search depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(fen: &str, depth: u32) -> Self {
        Self(format!("{}-{}", fen, depth))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached result and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: Arc<AnalysisResult>,
    pub created: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created) > ttl
    }
}

/// Thread-safe result cache.
pub struct ResultCache<C: Clock = SystemClock> {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
    clock: C,
}

impl ResultCache<SystemClock> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, SystemClock)
    }
}

impl Default for ResultCache<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<C: Clock> ResultCache<C> {
    pub fn with_clock(capacity: usize, ttl: Duration, clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            ttl,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh result. Expired entries are misses but stay in place
    /// until the next sweep.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<AnalysisResult>> {
        let now = self.clock.now();
        let entries = self.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(Arc::clone(&entry.result))
            }
            Some(_) => {
                tracing::debug!(key = %key, "Cache entry expired");
                None
            }
            None => None,
        }
    }

    /// Store a result. Returns `false` when the cache is full and `key` is
    /// not already present, in which case nothing is stored.
    pub fn put(&self, key: CacheKey, result: Arc<AnalysisResult>) -> bool {
        let created = self.clock.now();
        let mut entries = self.write();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            tracing::debug!(key = %key, capacity = self.capacity, "Cache full, result not stored");
            return false;
        }
        entries.insert(key, CacheEntry { result, created });
        true
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "Swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background thread that sweeps a cache on a fixed interval.
///
/// The thread stops when the handle is dropped or [`CacheSweeper::stop`] is
/// called. Intervals below [`MIN_SWEEP_INTERVAL`] are raised to it.
pub struct CacheSweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    pub fn start<C: Clock + 'static>(cache: Arc<ResultCache<C>>, interval: Duration) -> Self {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("cache-sweeper".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        cache.sweep_expired();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start cache sweeper");
                None
            }
        };

        Self {
            stop: Some(stop),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
