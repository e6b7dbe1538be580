use std::sync::Arc;

use crate::interfaces::DynError;

use super::{EvictResult, Hook};

/// Chains multiple [hooks](Hook).
pub struct HookChain<K> {
    hooks: Box<[Arc<dyn Hook<K>>]>,
}

impl<K> HookChain<K> {
    /// Create new chain from the given hooks.
    ///
    /// Hooks are called in the given order.
    pub fn new(hooks: impl IntoIterator<Item = Arc<dyn Hook<K>>>) -> Self {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }
}

impl<K> std::fmt::Debug for HookChain<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<K> Hook<K> for HookChain<K> {
    fn insert(&self, gen: u64, k: &K) {
        for hook in &self.hooks {
            hook.insert(gen, k);
        }
    }

    fn updated(&self, gen: u64, k: &K, res: Result<bool, &DynError>) {
        for hook in &self.hooks {
            hook.updated(gen, k, res);
        }
    }

    fn evict(&self, gen: u64, k: &K, res: EvictResult) {
        for hook in &self.hooks {
            hook.evict(gen, k, res);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        hook::test_utils::{TestHook, TestHookRecord},
        utils::str_err,
    };

    use super::*;

    #[test]
    fn test_empty_hook_chain() {
        let chain = HookChain::<()>::new([]);

        chain.insert(1, &());
        chain.updated(2, &(), Ok(true));
        chain.updated(3, &(), Err(&str_err("foo")));
        chain.evict(4, &(), EvictResult::Uncomputed);
        chain.evict(5, &(), EvictResult::Computed);
        chain.evict(6, &(), EvictResult::Failed);
    }

    #[test]
    fn test_hook_chain() {
        let h1 = Arc::new(TestHook::<u8>::default());
        let h2 = Arc::new(TestHook::<u8>::default());
        let chain = HookChain::<u8>::new([Arc::clone(&h1) as _, Arc::clone(&h2) as _]);

        chain.insert(0, &0);
        chain.updated(1, &1, Ok(true));
        chain.updated(2, &2, Ok(false));
        chain.updated(3, &3, Err(&str_err("e1")));
        chain.evict(4, &4, EvictResult::Uncomputed);
        chain.evict(5, &5, EvictResult::Computed);
        chain.evict(6, &6, EvictResult::Failed);

        let records = vec![
            TestHookRecord::Insert(0, 0),
            TestHookRecord::Updated(1, 1, Ok(true)),
            TestHookRecord::Updated(2, 2, Ok(false)),
            TestHookRecord::Updated(3, 3, Err("e1".to_owned())),
            TestHookRecord::Evict(4, 4, EvictResult::Uncomputed),
            TestHookRecord::Evict(5, 5, EvictResult::Computed),
            TestHookRecord::Evict(6, 6, EvictResult::Failed),
        ];
        assert_eq!(h1.records(), records,);
        assert_eq!(h2.records(), records,);
    }
}
