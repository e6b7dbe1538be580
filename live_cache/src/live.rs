//! Cache facade that keeps entries in sync with their owners.

use std::{
    hash::Hash,
    sync::{Arc, Weak},
};

use dashmap::{mapref::entry::Entry as MapEntry, DashMap};
use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::{
    hook::Hook,
    intent::CalculateOrPurge,
    interfaces::{DynError, UpdateResult},
    reactor::{
        reaction::{Reaction, ReactionExt},
        trigger::{Trigger, TriggerExt},
        Reactor,
    },
    store::{FutureStore, Updater},
    sweeper::{SweepToken, Sweeper},
};

/// Object that owns cached state and announces its changes.
///
/// An owner is typically a live domain object (a session, a device, a tracked race) whose derived
/// state we cache.
pub trait ChangeSource: Send + Sync + 'static {
    /// Event streams that fire whenever cached state derived from this owner may be stale.
    ///
    /// Every stream MUST end once `self` is dropped. The cache uses the end of these streams to
    /// detect that the owner is gone, see [`broadcast_trigger`].
    ///
    /// [`broadcast_trigger`]: crate::reactor::trigger::broadcast_trigger
    fn changes(&self) -> Vec<Trigger>;
}

/// Maps keys to their [owners](ChangeSource).
pub trait OwnerResolver: Send + Sync + 'static {
    /// Key identifying a cached unit of work.
    type Key: Clone + Eq + Hash + Send + Sync + 'static;

    /// The owner type.
    type Owner: ChangeSource;

    /// Resolve the owner for `key`, or `None` if the key is unknown.
    fn resolve(&self, key: &Self::Key) -> Option<Arc<Self::Owner>>;
}

/// Per-key link between an owner and the cache.
#[derive(Debug)]
struct Registration<O> {
    owner: Weak<O>,
    _reactor: Reactor,
}

/// Reaction that requests a recalculation of one key.
///
/// Also carries the key's [`SweepToken`]: the reaction lives exactly as long as the owner keeps
/// emitting, so dropping it marks the key as collectable.
struct LiveReaction<U>
where
    U: Updater,
{
    key: U::Key,
    store: Weak<FutureStore<U>>,
    _token: SweepToken<U::Key>,
}

impl<U> Reaction for LiveReaction<U>
where
    U: Updater<Intent = CalculateOrPurge>,
{
    fn exec(&self) -> BoxFuture<'_, Result<(), DynError>> {
        Box::pin(async {
            if let Some(store) = self.store.upgrade() {
                store.trigger_update(&self.key, CalculateOrPurge::Calculate);
            }
            Ok(())
        })
    }
}

/// Cache of computed values that follows the lifecycle of the objects they are derived from.
///
/// For every cached key the cache registers at the key's owner:
///
/// - every change event of the owner triggers a background recalculation, so readers mostly hit a
///   value that is already up to date
/// - once the owner is dropped its event streams end and the entry is swept out, so the cache
///   never outlives the data it is derived from
pub struct LiveCache<R, U>
where
    R: OwnerResolver,
    U: Updater<Key = R::Key, Intent = CalculateOrPurge>,
{
    name: &'static str,
    resolver: R,
    store: Arc<FutureStore<U>>,
    registrations: Arc<DashMap<U::Key, Registration<R::Owner>>>,
    sweeper: Sweeper<U::Key>,
    handle: Handle,
}

impl<R, U> std::fmt::Debug for LiveCache<R, U>
where
    R: OwnerResolver,
    U: Updater<Key = R::Key, Intent = CalculateOrPurge>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCache")
            .field("name", &self.name)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<R, U> LiveCache<R, U>
where
    R: OwnerResolver,
    U: Updater<Key = R::Key, Intent = CalculateOrPurge>,
    U::Key: std::fmt::Debug,
{
    /// Create new cache.
    ///
    /// `name` is used for log output. The handle is used to run the sweeper and the per-key
    /// reactors in background tasks.
    pub fn new(resolver: R, updater: U, hook: Arc<dyn Hook<U::Key>>, name: &'static str, handle: &Handle) -> Self {
        let store = Arc::new(FutureStore::new(updater, hook));
        let registrations: Arc<DashMap<U::Key, Registration<R::Owner>>> = Default::default();

        let store_captured = Arc::downgrade(&store);
        let registrations_captured = Arc::downgrade(&registrations);
        let sweeper = Sweeper::new(
            move |key: U::Key| {
                let (Some(store), Some(registrations)) =
                    (store_captured.upgrade(), registrations_captured.upgrade())
                else {
                    return;
                };

                // tokens of a replaced registration also end up here, so only sweep when no
                // live owner backs the key anymore
                let live = registrations
                    .get(&key)
                    .map(|reg| reg.owner.strong_count() > 0)
                    .unwrap_or(false);
                if live {
                    return;
                }

                registrations.remove(&key);
                store.remove(&key);
            },
            handle,
        );

        Self {
            name,
            resolver,
            store,
            registrations,
            sweeper,
            handle: handle.clone(),
        }
    }

    /// Get the value for `key`.
    ///
    /// With `wait_for_latest` the result reflects every change event and
    /// [`trigger_update`](Self::trigger_update) that happened before this call, at the cost of
    /// waiting for a fresh computation. Without it a cached value is returned immediately, which
    /// may race a recalculation that is still running.
    ///
    /// On a miss the owner is resolved, the key registered for its change events, and the first
    /// computation awaited. Returns `Ok(None)` when no owner exists for the key.
    pub async fn get(&self, key: &U::Key, wait_for_latest: bool) -> UpdateResult<U::Value> {
        if !wait_for_latest {
            if let Some(v) = self.store.get(key) {
                return Ok(Some(v));
            }
        }

        if !self.ensure_registered(key) {
            // the owner is gone, drop whatever we still hold for it
            self.remove(key);
            return Ok(None);
        }

        self.store.trigger_update(key, CalculateOrPurge::Calculate);
        self.store.get_wait(key).await
    }

    /// Request an update for `key` without waiting for it.
    pub fn trigger_update(&self, key: &U::Key, intent: CalculateOrPurge) {
        self.store.trigger_update(key, intent);
    }

    /// Forget `key`, including its owner registration.
    ///
    /// The next [`get`](Self::get) re-registers and recomputes.
    pub fn remove(&self, key: &U::Key) {
        self.registrations.remove(key);
        self.store.remove(key);
    }

    /// Stop sweeping.
    ///
    /// Entries whose owners die after this call are no longer evicted. Reads and updates keep
    /// working.
    pub fn stop(&self) {
        self.sweeper.stop();
    }

    /// Returns true once the sweeper has terminated.
    pub fn is_stopped(&self) -> bool {
        self.sweeper.is_stopped()
    }

    /// Get number of cached entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Return true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Make sure `key` is registered at a live owner.
    ///
    /// Returns false if no owner exists. If the owner was replaced since the last registration,
    /// the registration is replaced as well; the stale registration's sweep token is neutralized
    /// by the owner-liveness check in the sweeper.
    fn ensure_registered(&self, key: &U::Key) -> bool {
        if let Some(reg) = self.registrations.get(key) {
            if reg.owner.strong_count() > 0 {
                return true;
            }
        }

        // resolve before taking the map entry, resolvers may be slow
        let Some(owner) = self.resolver.resolve(key) else {
            return false;
        };

        match self.registrations.entry(key.clone()) {
            MapEntry::Occupied(mut o) => {
                let same = o
                    .get()
                    .owner
                    .upgrade()
                    .map(|existing| Arc::ptr_eq(&existing, &owner))
                    .unwrap_or(false);
                if !same {
                    o.insert(self.register(key, &owner));
                }
            }
            MapEntry::Vacant(v) => {
                v.insert(self.register(key, &owner));
            }
        }
        true
    }

    fn register(&self, key: &U::Key, owner: &Arc<R::Owner>) -> Registration<R::Owner> {
        let reaction = LiveReaction {
            key: key.clone(),
            store: Arc::downgrade(&self.store),
            _token: self.sweeper.track(key.clone()),
        };
        let triggers = owner
            .changes()
            .into_iter()
            .map(|t| t.observe(self.name, "change"));
        let reactor = Reactor::new(triggers, reaction.observe(self.name), &self.handle);
        Registration {
            owner: Arc::downgrade(owner),
            _reactor: reactor,
        }
    }
}
