use std::sync::Mutex;

use crate::{hook::Hook, interfaces::DynError};

use super::EvictResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestHookRecord<K>
where
    K: Clone + Eq + std::fmt::Debug + Send,
{
    Insert(u64, K),
    Updated(u64, K, Result<bool, String>),
    Evict(u64, K, EvictResult),
}

/// A [`Hook`] that records all events, for tests.
#[derive(Debug, Default)]
pub struct TestHook<K>
where
    K: Clone + Eq + std::fmt::Debug + Send,
{
    records: Mutex<Vec<TestHookRecord<K>>>,
}

impl<K> TestHook<K>
where
    K: Clone + Eq + std::fmt::Debug + Send,
{
    pub fn records(&self) -> Vec<TestHookRecord<K>> {
        self.records.lock().unwrap().clone()
    }

    /// Number of finished computations observed so far.
    pub fn updated_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches!(r, TestHookRecord::Updated(..)))
            .count()
    }
}

impl<K> Hook<K> for TestHook<K>
where
    K: Clone + Eq + std::fmt::Debug + Send + Sync,
{
    fn insert(&self, gen: u64, k: &K) {
        self.records
            .lock()
            .unwrap()
            .push(TestHookRecord::Insert(gen, k.clone()))
    }

    fn updated(&self, gen: u64, k: &K, res: Result<bool, &DynError>) {
        self.records.lock().unwrap().push(TestHookRecord::Updated(
            gen,
            k.clone(),
            res.map_err(|e| e.to_string()),
        ));
    }

    fn evict(&self, gen: u64, k: &K, res: EvictResult) {
        self.records
            .lock()
            .unwrap()
            .push(TestHookRecord::Evict(gen, k.clone(), res));
    }
}
