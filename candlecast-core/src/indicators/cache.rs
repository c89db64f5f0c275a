//! TTL cache for indicator scalars.
//!
//! Keyed by indicator name and period plus a [`WindowFingerprint`]: the
//! last-candle timestamp, the window length, and a BLAKE3 digest of every
//! candle, so windows that share timestamps but differ in prices (two
//! symbols through one engine) never share entries.
//! Reads treat expired entries as misses but never remove them; a janitor
//! thread sweeps expired entries on its own schedule and exits when the
//! cache is dropped.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::domain::Candle;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
/// Default janitor sweep period.
pub const DEFAULT_SWEEP_EVERY: Duration = Duration::from_secs(60);

/// Identity of one candle window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowFingerprint {
    pub last_timestamp: i64,
    pub len: usize,
    pub digest: [u8; 32],
}

impl WindowFingerprint {
    pub fn of(window: &[Candle]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for c in window {
            hasher.update(&c.timestamp.timestamp_millis().to_le_bytes());
            for v in [c.open, c.high, c.low, c.close] {
                hasher.update(&v.to_bits().to_le_bytes());
            }
            hasher.update(&c.volume.to_le_bytes());
        }
        Self {
            last_timestamp: window.last().map_or(0, |c| c.timestamp.timestamp_millis()),
            len: window.len(),
            digest: *hasher.finalize().as_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub indicator: String,
    pub period: usize,
    pub window: WindowFingerprint,
}

impl CacheKey {
    pub fn new(indicator: impl Into<String>, period: usize, window: &[Candle]) -> Self {
        Self::for_window(indicator, period, WindowFingerprint::of(window))
    }

    /// Key for an already fingerprinted window.
    pub fn for_window(indicator: impl Into<String>, period: usize, window: WindowFingerprint) -> Self {
        Self {
            indicator: indicator.into(),
            period,
            window,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    values: Vec<f64>,
    inserted: Instant,
}

type Store = Arc<Mutex<HashMap<CacheKey, Entry>>>;

fn lock(store: &Store) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

fn purge(store: &Store, ttl: Duration) -> usize {
    let mut map = lock(store);
    let before = map.len();
    map.retain(|_, e| e.inserted.elapsed() < ttl);
    before - map.len()
}

struct Janitor {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Shared, thread-safe indicator cache.
pub struct IndicatorCache {
    store: Store,
    ttl: Duration,
    janitor: Option<Janitor>,
}

impl std::fmt::Debug for IndicatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .field("janitor", &self.janitor.is_some())
            .finish()
    }
}

impl Default for IndicatorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL, DEFAULT_SWEEP_EVERY)
    }

    /// Cache with a custom lifetime and janitor period.
    pub fn with_ttl(ttl: Duration, sweep_every: Duration) -> Self {
        let store: Store = Arc::new(Mutex::new(HashMap::new()));
        let janitor = spawn_janitor(Arc::clone(&store), ttl, sweep_every);
        Self {
            store,
            ttl,
            janitor,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`, if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<f64>> {
        lock(&self.store)
            .get(key)
            .filter(|e| e.inserted.elapsed() < self.ttl)
            .map(|e| e.values.clone())
    }

    pub fn insert(&self, key: CacheKey, values: Vec<f64>) {
        lock(&self.store).insert(
            key,
            Entry {
                values,
                inserted: Instant::now(),
            },
        );
    }

    /// Cached values for `key`, computing and storing them on a miss.
    ///
    /// The lock is not held while `compute` runs.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Vec<f64>
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(values) = self.get(&key) {
            return values;
        }
        let values = compute();
        self.insert(key, values.clone());
        values
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        lock(&self.store).remove(key).is_some()
    }

    pub fn clear(&self) {
        lock(&self.store).clear();
    }

    /// Remove expired entries now; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.store, self.ttl)
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn spawn_janitor(store: Store, ttl: Duration, sweep_every: Duration) -> Option<Janitor> {
    let (stop, stop_rx) = mpsc::channel::<()>();
    let spawned = thread::Builder::new()
        .name("candlecast-cache-janitor".into())
        .spawn(move || loop {
            match stop_rx.recv_timeout(sweep_every) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = purge(&store, ttl);
                    if removed > 0 {
                        debug!(removed, "indicator cache sweep");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
    match spawned {
        Ok(handle) => Some(Janitor { stop, handle }),
        Err(err) => {
            warn!(%err, "cache janitor not started; expired entries only purge on demand");
            None
        }
    }
}

impl Drop for IndicatorCache {
    fn drop(&mut self) {
        if let Some(janitor) = self.janitor.take() {
            let _ = janitor.stop.send(());
            let _ = janitor.handle.join();
        }
    }
}
