//! Future-backed value store with intent coalescing.

use std::{
    hash::Hash,
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry as MapEntry, DashMap};
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use observability_deps::tracing::debug;

use crate::{
    hook::{EvictResult, Hook},
    intent::UpdateIntent,
    interfaces::{DynError, UpdateResult},
    utils::{CatchUnwindDynErrorExt, TokioTask},
};

/// Future that distributes the result of one update computation to all interested readers.
pub type UpdateFut<V> = Shared<BoxFuture<'static, UpdateResult<V>>>;

/// The computation that produces values for a [`FutureStore`].
///
/// Supplied once per store instance and invoked by background tasks.
pub trait Updater: Send + Sync + 'static {
    /// Key identifying a cached unit of work.
    type Key: Clone + Eq + Hash + Send + Sync + 'static;

    /// Computed value.
    type Value: Send + Sync + 'static;

    /// Intent lattice driving the computation.
    type Intent: UpdateIntent;

    /// Compute a new value for `key`.
    ///
    /// Returning `Ok(None)` purges the entry, i.e. the store forgets the key. Whether a given
    /// intent purges is the updater's policy, not the store's.
    ///
    /// Errors and panics are captured on the entry's future and re-raised to all
    /// [`get_wait`](FutureStore::get_wait) callers of that computation. The store does NOT retry.
    ///
    /// The returned future must not call back into the store.
    fn update(
        &self,
        key: &Self::Key,
        intent: Self::Intent,
    ) -> BoxFuture<'static, Result<Option<Self::Value>, DynError>>;
}

/// [`Updater`] built from a closure.
pub struct FnUpdater<K, V, I, F> {
    f: F,
    _types: PhantomData<fn(K, I) -> V>,
}

impl<K, V, I, F> FnUpdater<K, V, I, F>
where
    F: Fn(&K, I) -> BoxFuture<'static, Result<Option<V>, DynError>> + Send + Sync + 'static,
{
    /// Create new updater from the given closure.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _types: PhantomData,
        }
    }
}

impl<K, V, I, F> std::fmt::Debug for FnUpdater<K, V, I, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnUpdater").finish_non_exhaustive()
    }
}

impl<K, V, I, F> Updater for FnUpdater<K, V, I, F>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    I: UpdateIntent,
    F: Fn(&K, I) -> BoxFuture<'static, Result<Option<V>, DynError>> + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;
    type Intent = I;

    fn update(&self, key: &K, intent: I) -> BoxFuture<'static, Result<Option<V>, DynError>> {
        (self.f)(key, intent)
    }
}

/// State of a single key.
#[derive(Debug)]
struct CacheEntry<V, I> {
    /// Generation of the most recently started computation.
    ///
    /// Used to detect completions that refer to an entry that was removed and re-created in the
    /// meantime.
    gen: u64,

    /// Last completed good value.
    value: Option<Arc<V>>,

    /// Last computation failed.
    failed: bool,

    /// In-flight computation, if any.
    running: Option<UpdateFut<V>>,

    /// Work requested while [`running`](Self::running), merged via
    /// [`join`](UpdateIntent::join).
    pending: Option<I>,
}

impl<V, I> CacheEntry<V, I> {
    fn evict_result(&self) -> EvictResult {
        if self.failed {
            EvictResult::Failed
        } else if self.value.is_some() {
            EvictResult::Computed
        } else {
            EvictResult::Uncomputed
        }
    }
}

struct StoreInner<U>
where
    U: Updater,
{
    updater: U,
    hook: Arc<dyn Hook<U::Key>>,
    entries: DashMap<U::Key, CacheEntry<U::Value, U::Intent>>,
    gen_counter: AtomicU64,
}

impl<U> StoreInner<U>
where
    U: Updater,
{
    /// Start a computation for `key` and park its shared future on the entry.
    ///
    /// Must be called while holding the map entry for `key`.
    fn start_update(
        self: &Arc<Self>,
        key: &U::Key,
        entry: &mut CacheEntry<U::Value, U::Intent>,
        intent: U::Intent,
    ) {
        let gen = self.gen_counter.fetch_add(1, Ordering::Relaxed);
        entry.gen = gen;

        // set up the future BEFORE spawning so the updater runs outside the entry lock
        let fut = self.updater.update(key, intent);
        let inner_captured = Arc::downgrade(self);
        let key_captured = key.clone();
        let fut = async move {
            let res = fut
                .catch_unwind_dyn_error()
                .await
                .map(|v| v.map(Arc::new));
            if let Some(inner) = inner_captured.upgrade() {
                inner.finish(&key_captured, gen, &res);
            }
            res
        };
        entry.running = Some(TokioTask::spawn(fut).boxed().shared());
    }

    /// Book-keeping after a computation finished.
    ///
    /// Records the result, starts the follow-up computation if an intent was coalesced while we
    /// were running, and drops the entry if the updater purged it.
    fn finish(self: &Arc<Self>, key: &U::Key, gen: u64, res: &UpdateResult<U::Value>) {
        match self.entries.entry(key.clone()) {
            MapEntry::Occupied(mut o) => {
                let entry = o.get_mut();
                if entry.gen != gen {
                    // stale completion, the entry was removed and re-created in the meantime
                    return;
                }
                entry.running = None;
                self.hook.updated(
                    gen,
                    key,
                    match res {
                        Ok(v) => Ok(v.is_some()),
                        Err(e) => Err(e),
                    },
                );

                match res {
                    Ok(Some(v)) => {
                        entry.value = Some(Arc::clone(v));
                        entry.failed = false;
                    }
                    Ok(None) => {
                        entry.value = None;
                        entry.failed = false;
                    }
                    Err(_) => {
                        // keep the last good value visible to non-blocking readers
                        entry.failed = true;
                    }
                }

                if let Some(intent) = entry.pending.take() {
                    self.start_update(key, entry, intent);
                } else if matches!(res, Ok(None)) {
                    let entry = o.remove();
                    self.hook.evict(gen, key, entry.evict_result());
                }
            }
            MapEntry::Vacant(_) => {
                // entry was removed while we were computing, nothing to record
            }
        }
    }
}

/// Store that maps keys to failable value futures.
///
/// For every key, at most one computation runs at any time. Update requests that arrive while a
/// computation is running are merged into a single follow-up request, see
/// [`trigger_update`](Self::trigger_update).
pub struct FutureStore<U>
where
    U: Updater,
{
    inner: Arc<StoreInner<U>>,
}

impl<U> std::fmt::Debug for FutureStore<U>
where
    U: Updater,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureStore")
            .field("entries", &self.inner.entries.len())
            .finish_non_exhaustive()
    }
}

impl<U> FutureStore<U>
where
    U: Updater,
{
    /// Create new, empty store.
    pub fn new(updater: U, hook: Arc<dyn Hook<U::Key>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                updater,
                hook,
                entries: Default::default(),
                gen_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Request an update for `key` with the given intent.
    ///
    /// If no computation is running for `key`, one starts immediately. Otherwise `intent` is
    /// [joined](UpdateIntent::join) into the entry's pending intent and exactly one follow-up
    /// computation starts once the running one finishes. The store therefore always converges to
    /// a state that reflects the most recent request without ever running two computations for
    /// the same key in parallel.
    pub fn trigger_update(&self, key: &U::Key, intent: U::Intent) {
        match self.inner.entries.entry(key.clone()) {
            MapEntry::Occupied(mut o) => {
                let entry = o.get_mut();
                if entry.running.is_some() {
                    let joined = match entry.pending {
                        Some(pending) => pending.join(intent),
                        None => intent,
                    };
                    entry.pending = Some(joined);
                    debug!(gen = entry.gen, ?joined, "coalesced update request");
                } else {
                    self.inner.start_update(key, entry, intent);
                }
            }
            MapEntry::Vacant(v) => {
                let mut entry = CacheEntry {
                    gen: 0,
                    value: None,
                    failed: false,
                    running: None,
                    pending: None,
                };
                self.inner.start_update(v.key(), &mut entry, intent);
                self.inner.hook.insert(entry.gen, v.key());
                v.insert(entry);
            }
        }
    }

    /// Get the last completed value without waiting.
    ///
    /// Returns `None` if nothing was computed yet or the entry was purged. An in-flight
    /// computation does not hide the previous value.
    pub fn get(&self, key: &U::Key) -> Option<Arc<U::Value>> {
        self.inner.entries.get(key).and_then(|e| e.value.clone())
    }

    /// Wait for the in-flight computation for `key` (if any) and return its result.
    ///
    /// The result reflects every [`trigger_update`](Self::trigger_update) that happened before
    /// this call: if a follow-up request was already coalesced when we start waiting, this waits
    /// for the follow-up computation instead of returning the soon-to-be-stale result.
    ///
    /// Returns the last completed value when no computation is running, and `Ok(None)` for
    /// unknown keys. A failed computation is re-raised to every waiting caller.
    pub async fn get_wait(&self, key: &U::Key) -> UpdateResult<U::Value> {
        loop {
            let (fut, chase) = {
                let Some(entry) = self.inner.entries.get(key) else {
                    return Ok(None);
                };
                match &entry.running {
                    None => return Ok(entry.value.clone()),
                    Some(fut) => (fut.clone(), entry.pending.is_some()),
                }
            };

            let res = fut.await;
            if !chase {
                return res;
            }
            // a follow-up computation was scheduled before we started waiting; by now it is
            // registered on the entry, so loop and wait for that one
        }
    }

    /// Forget `key`.
    ///
    /// A running computation is not interrupted and still resolves for readers that already wait
    /// on it, but its result is not recorded anymore. A computation nobody waits for is aborted.
    pub fn remove(&self, key: &U::Key) {
        if let Some((_key, entry)) = self.inner.entries.remove(key) {
            self.inner.hook.evict(entry.gen, key, entry.evict_result());
        }
    }

    /// Get number of entries in the store.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Return true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
