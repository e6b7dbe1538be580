use std::marker::PhantomData;

use observability_deps::tracing::debug;

use crate::{hook::Hook, interfaces::DynError};

use super::EvictResult;

/// A [`Hook`] that logs all store transitions.
#[derive(Debug)]
pub struct ObserverHook<K>
where
    K: std::fmt::Debug,
{
    _k: PhantomData<dyn Fn() -> K + Send + Sync + 'static>,
    cache: &'static str,
}

impl<K> ObserverHook<K>
where
    K: std::fmt::Debug,
{
    /// Create new hook for the cache with the given name.
    pub fn new(cache: &'static str) -> Self {
        Self {
            _k: Default::default(),
            cache,
        }
    }
}

impl<K> Hook<K> for ObserverHook<K>
where
    K: std::fmt::Debug + Send + Sync,
{
    fn insert(&self, gen: u64, k: &K) {
        debug!(cache = self.cache, gen, ?k, "insert");
    }

    fn updated(&self, gen: u64, k: &K, res: Result<bool, &DynError>) {
        match res {
            Ok(true) => {
                debug!(cache = self.cache, gen, ?k, "updated successfully");
            }
            Ok(false) => {
                debug!(cache = self.cache, gen, ?k, "purged by updater");
            }
            Err(e) => {
                debug!(cache = self.cache, gen, ?k, %e, "failed to update");
            }
        }
    }

    fn evict(&self, gen: u64, k: &K, res: EvictResult) {
        match res {
            EvictResult::Uncomputed => {
                debug!(cache = self.cache, gen, ?k, "evict entry that was never computed");
            }
            EvictResult::Computed => {
                debug!(cache = self.cache, gen, ?k, "evict entry that held a value");
            }
            EvictResult::Failed => {
                debug!(
                    cache = self.cache,
                    gen,
                    ?k,
                    "evict entry whose computation failed"
                );
            }
        }
    }
}
