// ── Polled cache ──
//
// Scheduled-refetch cache keyed by (resource, scope, params). Each entry
// is independent: its own interval, retry policy, staleness window and
// enabled flag, its own background poll task, and at most one request
// in flight at a time.

mod entry;
mod key;
mod policy;

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use entry::{QueryHandle, QueryState};
pub use key::{CacheKey, Resource, Scope};
pub use policy::{EntryConfig, RetryPolicy};

use entry::{Entry, ErasedEntry, boxed_fetcher, poll_loop};

use crate::error::CoreError;
use crate::session::SessionContext;

/// Cheaply cloneable; clones share entries and poll tasks.
#[derive(Clone)]
pub struct PolledCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: DashMap<CacheKey, Arc<dyn ErasedEntry>>,
    session: SessionContext,
    cancel: CancellationToken,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PolledCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolledCache")
            .field("entries", &self.inner.entries.len())
            .finish_non_exhaustive()
    }
}

impl PolledCache {
    pub fn new(session: SessionContext) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                session,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Register a query, or return the existing entry for `key`.
    ///
    /// An existing entry keeps its original fetcher and schedule but takes
    /// the `enabled` flag from `config`. Spawns the entry's poll task, so
    /// this must run inside a Tokio runtime.
    pub fn register<T, F, Fut>(
        &self,
        key: CacheKey,
        config: EntryConfig,
        fetch: F,
    ) -> Result<QueryHandle<T>, CoreError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        match self.inner.entries.entry(key) {
            MapEntry::Occupied(occupied) => {
                let erased = Arc::clone(occupied.get());
                erased.set_enabled(config.enabled);
                downcast(occupied.key(), erased)
            }
            MapEntry::Vacant(vacant) => {
                let key = vacant.key().clone();
                debug!(key = %key, ?config, "registering cache entry");
                let entry = Arc::new(Entry::new(
                    key,
                    config,
                    boxed_fetcher(fetch),
                    self.inner.session.clone(),
                    self.inner.cancel.child_token(),
                ));
                vacant.insert(Arc::clone(&entry) as Arc<dyn ErasedEntry>);
                tokio::spawn(poll_loop(Arc::clone(&entry)));
                Ok(QueryHandle::new(entry))
            }
        }
    }

    /// Typed handle to an already-registered entry.
    pub fn handle<T: Send + Sync + 'static>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<QueryHandle<T>>, CoreError> {
        let Some(erased) = self.inner.entries.get(key).map(|e| Arc::clone(e.value())) else {
            return Ok(None);
        };
        downcast(key, erased).map(Some)
    }

    /// `get(key)`: the entry's `{data, error, is_loading}`, fetching if stale.
    pub async fn get<T: Send + Sync + 'static>(
        &self,
        key: &CacheKey,
    ) -> Result<QueryState<T>, CoreError> {
        let handle = self.handle::<T>(key)?.ok_or_else(|| CoreError::NotFound {
            entity_type: "cache entry".into(),
            identifier: key.to_string(),
        })?;
        Ok(handle.get().await)
    }

    /// Mark every parameterization of `resource` under `scope` stale and
    /// wake its scheduler. Returns the number of entries touched.
    pub fn invalidate(&self, resource: Resource, scope: &Scope) -> usize {
        let mut touched = 0;
        for item in &self.inner.entries {
            if item.key().matches(resource, scope) {
                item.value().invalidate();
                touched += 1;
            }
        }
        debug!(%resource, %scope, touched, "invalidated");
        touched
    }

    /// Disable every entry bound to `scope`; no further fetch is scheduled.
    pub fn disable_scope(&self, scope: &Scope) -> usize {
        let mut touched = 0;
        for item in &self.inner.entries {
            if &item.key().scope == scope && item.value().is_enabled() {
                item.value().set_enabled(false);
                touched += 1;
            }
        }
        debug!(%scope, touched, "disabled scope");
        touched
    }

    /// Drop every entry bound to `scope` and stop its poll task.
    ///
    /// Outstanding handles keep their last state but never fetch again.
    pub fn remove_scope(&self, scope: &Scope) -> usize {
        let mut removed = 0;
        self.inner.entries.retain(|key, entry| {
            if &key.scope != scope {
                return true;
            }
            entry.retire();
            removed += 1;
            false
        });
        debug!(%scope, removed, "removed scope");
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Stop every poll task. Entries keep their last state.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

fn downcast<T: Send + Sync + 'static>(
    key: &CacheKey,
    erased: Arc<dyn ErasedEntry>,
) -> Result<QueryHandle<T>, CoreError> {
    erased
        .into_any()
        .downcast::<Entry<T>>()
        .map(QueryHandle::new)
        .map_err(|_| {
            CoreError::Internal(format!(
                "cache key {key} is registered with a different payload type"
            ))
        })
}
