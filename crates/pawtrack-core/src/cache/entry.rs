// ── Cache entry: state, fetch dedupe, scheduling ──
//
// One `Entry<T>` per cache key. The entry owns its latest `QueryState`
// (published through a watch channel), a fetch lock that serializes
// network calls, and a background poll task that drives refetching.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::policy::EntryConfig;
use crate::error::CoreError;
use crate::session::SessionContext;

pub(crate) type Fetcher<T> =
    Box<dyn Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

// ── QueryState ───────────────────────────────────────────────────────

/// What a consumer sees for one cached query.
///
/// `data` survives a later failed refetch; `error` holds the outcome of
/// the most recent fetch only.
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<CoreError>,
    pub is_loading: bool,
    /// Wall-clock time of the last successful fetch.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Monotonic time of the last successful fetch (drives staleness).
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            fetched_at: None,
            updated_at: None,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("is_loading", &self.is_loading)
            .field("fetched_at", &self.fetched_at)
            .finish_non_exhaustive()
    }
}

// ── Entry ────────────────────────────────────────────────────────────

pub(crate) struct Entry<T> {
    key: CacheKey,
    config: EntryConfig,
    fetcher: Fetcher<T>,
    state: watch::Sender<QueryState<T>>,
    enabled: watch::Sender<bool>,
    /// Held for the duration of a network call; at most one in flight.
    fetch_lock: Mutex<()>,
    /// Finished fetch cycles. A waiter that sees this move joins the
    /// result instead of issuing its own request.
    completed: AtomicU64,
    /// Set by invalidation or an elapsed interval; cleared when a fetch starts.
    stale: AtomicBool,
    wake: Notify,
    session: SessionContext,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> Entry<T> {
    pub(crate) fn new(
        key: CacheKey,
        config: EntryConfig,
        fetcher: Fetcher<T>,
        session: SessionContext,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        let (enabled, _) = watch::channel(config.enabled);
        Self {
            key,
            config,
            fetcher,
            state,
            enabled,
            fetch_lock: Mutex::new(()),
            completed: AtomicU64::new(0),
            stale: AtomicBool::new(false),
            wake: Notify::new(),
            session,
            cancel,
        }
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn snapshot(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        let changed = self.enabled.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
        if changed {
            debug!(key = %self.key, enabled, "cache entry toggled");
        }
    }

    /// Mark stale and wake the scheduler. Disabled entries just stay stale.
    pub(crate) fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    fn is_fresh(&self) -> bool {
        if self.stale.load(Ordering::Acquire) {
            return false;
        }
        match self.state.borrow().updated_at {
            Some(at) => at.elapsed() < self.config.stale_time,
            None => false,
        }
    }

    /// Serve the cached value if fresh, otherwise fetch (joining any
    /// in-flight request). Disabled entries return their current state.
    pub(crate) async fn get(&self) -> QueryState<T> {
        if !self.is_enabled() || self.is_fresh() {
            return self.snapshot();
        }
        self.fetch().await
    }

    /// Run one fetch cycle, or join the one already running.
    pub(crate) async fn fetch(&self) -> QueryState<T> {
        let seen = self.completed.load(Ordering::Acquire);
        let _guard = self.fetch_lock.lock().await;
        if self.completed.load(Ordering::Acquire) != seen {
            return self.snapshot();
        }

        self.stale.store(false, Ordering::Release);
        self.state.send_modify(|s| s.is_loading = true);

        let result = self.fetch_with_retry().await;

        match result {
            Ok(value) => {
                self.state.send_modify(|s| {
                    s.data = Some(Arc::new(value));
                    s.error = None;
                    s.is_loading = false;
                    s.fetched_at = Some(Utc::now());
                    s.updated_at = Some(Instant::now());
                });
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.session.invalidate(format!("401 from {}", self.key));
                } else {
                    warn!(key = %self.key, error = %e, "fetch failed");
                }
                self.state.send_modify(|s| {
                    s.error = Some(e);
                    s.is_loading = false;
                });
            }
        }

        self.completed.fetch_add(1, Ordering::AcqRel);
        self.snapshot()
    }

    async fn fetch_with_retry(&self) -> Result<T, CoreError> {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            match (self.fetcher)().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unauthorized() || attempt >= policy.retries => return Err(e),
                Err(e) => {
                    let delay = policy.delay(attempt);
                    debug!(key = %self.key, error = %e, attempt, ?delay, "retrying fetch");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Err(e),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

// ── Background scheduling ────────────────────────────────────────────

/// Per-entry scheduler: park while disabled, fetch when not fresh, then
/// wait for the next wake-up (interval, invalidation, toggle, session).
pub(crate) async fn poll_loop<T: Send + Sync + 'static>(entry: Arc<Entry<T>>) {
    let cancel = entry.cancel.clone();
    let mut enabled_rx = entry.enabled.subscribe();
    let mut session_rx = entry.session.subscribe();

    loop {
        if !*enabled_rx.borrow_and_update() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = enabled_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }

        // Scheduled fetches pause while the session is invalid; a 401 is
        // never answered with another request.
        session_rx.borrow_and_update();
        if !entry.is_fresh() && !entry.session.is_invalidated() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = entry.fetch() => {}
            }
        }

        let interval = entry.config.refetch_interval;
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = entry.wake.notified() => {}
            changed = enabled_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = session_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = sleep_for(interval) => {
                entry.stale.store(true, Ordering::Release);
            }
        }
    }

    debug!(key = %entry.key, "poll task exiting");
}

async fn sleep_for(interval: Option<std::time::Duration>) {
    match interval {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

// ── Type erasure ─────────────────────────────────────────────────────

/// Object-safe view of an `Entry<T>` so entries of different payload
/// types share one map.
pub(crate) trait ErasedEntry: Send + Sync {
    fn key(&self) -> &CacheKey;
    fn invalidate(&self);
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    /// Disable and stop the poll task for good.
    fn retire(&self);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + Sync + 'static> ErasedEntry for Entry<T> {
    fn key(&self) -> &CacheKey {
        Entry::key(self)
    }

    fn invalidate(&self) {
        Entry::invalidate(self);
    }

    fn set_enabled(&self, enabled: bool) {
        Entry::set_enabled(self, enabled);
    }

    fn is_enabled(&self) -> bool {
        Entry::is_enabled(self)
    }

    fn retire(&self) {
        Entry::set_enabled(self, false);
        self.cancel.cancel();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Box a closure returning a future into the stored fetcher shape.
pub(crate) fn boxed_fetcher<T, F, Fut>(fetch: F) -> Fetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
{
    Box::new(move || Box::pin(fetch()))
}

// ── QueryHandle ──────────────────────────────────────────────────────

/// Typed access to one cache entry.
pub struct QueryHandle<T> {
    entry: Arc<Entry<T>>,
}

impl<T> Clone for QueryHandle<T> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<T> fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", &self.entry.key)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
    pub(crate) fn new(entry: Arc<Entry<T>>) -> Self {
        Self { entry }
    }

    pub fn key(&self) -> &CacheKey {
        self.entry.key()
    }

    /// Cached value if fresh, else fetch. Concurrent callers share one request.
    pub async fn get(&self) -> QueryState<T> {
        self.entry.get().await
    }

    /// Current state without triggering a fetch.
    pub fn snapshot(&self) -> QueryState<T> {
        self.entry.snapshot()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.entry.state.borrow().data.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.entry.subscribe()
    }

    /// Invalidate, then fetch now if enabled.
    pub async fn refetch(&self) -> QueryState<T> {
        self.entry.stale.store(true, Ordering::Release);
        self.entry.get().await
    }

    pub fn invalidate(&self) {
        self.entry.invalidate();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.entry.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.entry.is_enabled()
    }
}
