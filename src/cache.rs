//! Single-value result cache with a fixed freshness window.
//!
//! The cell holds an immutable snapshot that is swapped wholesale. A failed
//! refresh leaves the previous snapshot in place. Concurrent misses share one
//! in-flight refresh.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A computed value and when it was computed.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub computed_at: Instant,
}

/// Caches one value for `ttl`. Refresh errors of type `E` are shared with
/// every caller that waited on the failed attempt.
pub struct ResultCache<T, E> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cell: RwLock<Option<Arc<CacheEntry<T>>>>,
    /// Completed refresh attempts, successful or not.
    attempts: AtomicU64,
    /// Held for the duration of a refresh; holds the last attempt's failure.
    refresh: tokio::sync::Mutex<Option<Arc<E>>>,
}

impl<T, E> ResultCache<T, E> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            cell: RwLock::new(None),
            attempts: AtomicU64::new(0),
            refresh: tokio::sync::Mutex::new(None),
        }
    }

    /// Current entry, fresh or not.
    pub async fn peek(&self) -> Option<Arc<CacheEntry<T>>> {
        self.cell.read().await.clone()
    }

    async fn fresh(&self) -> Option<Arc<T>> {
        let entry = self.cell.read().await.clone()?;
        let age = self.clock.now().saturating_duration_since(entry.computed_at);
        (age < self.ttl).then(|| entry.value.clone())
    }

    /// Returns the cached value while it is fresh, otherwise runs `refresh`.
    ///
    /// On success the new value replaces the old one. On failure the error is
    /// returned and the cell is left untouched. Callers that queued behind an
    /// in-flight refresh get its outcome instead of starting their own, so no
    /// caller waits longer than one refresh.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<Arc<T>, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.fresh().await {
            debug!("Cache hit");
            return Ok(value);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.refresh.lock().await;
        if let Some(value) = self.fresh().await {
            debug!("Cache filled by concurrent refresh");
            return Ok(value);
        }
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = last_failure.as_ref() {
                debug!("Concurrent refresh failed, sharing its error");
                return Err(err.clone());
            }
        }

        debug!("Cache miss, refreshing");
        let started = self.clock.now();
        let outcome = refresh().await;
        self.attempts.fetch_add(1, Ordering::Release);
        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *self.cell.write().await = Some(Arc::new(CacheEntry {
                    value: value.clone(),
                    computed_at: started,
                }));
                *last_failure = None;
                Ok(value)
            }
            Err(err) => {
                let err = Arc::new(err);
                *last_failure = Some(err.clone());
                Err(err)
            }
        }
    }
}
