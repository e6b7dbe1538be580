//! Hooks into the store lifecycle.

pub mod chain;
pub mod observer;
pub mod test_utils;

use crate::interfaces::DynError;

/// A trait for hooking into store updates.
///
/// This can be used for:
/// - injecting logging
/// - maintaining secondary indices
/// - instrumenting tests
/// - ...
///
/// Note: members are invoked under locks and should therefore
/// be short-running and not call back into the store.
pub trait Hook<K: ?Sized>: std::fmt::Debug + Send + Sync {
    /// Called when a new entry is created.
    fn insert(&self, _gen: u64, _k: &K) {}

    /// A computation for the key finished.
    ///
    /// `Ok(true)` means the updater produced a value, `Ok(false)` means it purged the entry.
    fn updated(&self, _gen: u64, _k: &K, _res: Result<bool, &DynError>) {}

    /// A key was removed.
    fn evict(&self, _gen: u64, _k: &K, _res: EvictResult) {}
}

/// Status that is reported to [`Hook::evict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictResult {
    /// Evict entry that never finished a computation.
    Uncomputed,

    /// Evict entry that held a computed value.
    Computed,

    /// Evict entry whose last computation failed.
    Failed,
}
