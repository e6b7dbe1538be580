//! Deferred eviction of entries whose owner went away.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use observability_deps::tracing::{debug, info};
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, UnboundedSender},
    task::JoinSet,
};

/// Event processed by a [`Sweeper`].
#[derive(Debug)]
enum SweepEvent<K> {
    /// The [token](SweepToken) for the given key was dropped.
    Collected(K),

    /// Shut the sweeper down.
    Stop,
}

/// Token that marks one key as alive.
///
/// Dropping the token asks the owning [`Sweeper`] to evict the key. Tokens are meant to be held
/// by whatever construct tracks the key's liveness, so eviction happens as a side effect of that
/// construct going away.
#[derive(Debug)]
pub struct SweepToken<K>
where
    K: Send + 'static,
{
    key: Option<K>,
    tx: UnboundedSender<SweepEvent<K>>,
}

impl<K> Drop for SweepToken<K>
where
    K: Send + 'static,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // fails when the sweeper is already stopped, which is fine
            self.tx.send(SweepEvent::Collected(key)).ok();
        }
    }
}

/// Background task that evicts keys whose [tokens](SweepToken) were dropped.
///
/// Eviction is asynchronous: a dropped token only enqueues the key, the sweeper task performs the
/// actual eviction. [`stop`](Self::stop) enqueues a final event behind all already-collected keys,
/// so events sent before the stop are still processed.
pub struct Sweeper<K>
where
    K: Send + 'static,
{
    tx: UnboundedSender<SweepEvent<K>>,
    stopped: Arc<AtomicBool>,
    _task: JoinSet<()>,
}

impl<K> std::fmt::Debug for Sweeper<K>
where
    K: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<K> Sweeper<K>
where
    K: std::fmt::Debug + Send + 'static,
{
    /// Create new sweeper that runs `evict` for every collected key.
    ///
    /// The handle is used to run the sweeper in a background task. Dropping the sweeper aborts
    /// the task.
    pub fn new<F>(evict: F, handle: &Handle) -> Self
    where
        F: Fn(K) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let stopped_captured = Arc::clone(&stopped);
        let mut task = JoinSet::new();
        task.spawn_on(
            async move {
                loop {
                    match rx.recv().await {
                        Some(SweepEvent::Collected(key)) => {
                            debug!(?key, "sweeping collected key");
                            evict(key);
                        }
                        Some(SweepEvent::Stop) => {
                            info!("sweeper stopped");
                            break;
                        }
                        None => {
                            info!("sweeper channel closed");
                            break;
                        }
                    }
                }
                stopped_captured.store(true, Ordering::SeqCst);
            },
            handle,
        );

        Self {
            tx,
            stopped,
            _task: task,
        }
    }

    /// Track `key`.
    ///
    /// The key is evicted once the returned token is dropped.
    pub fn track(&self, key: K) -> SweepToken<K> {
        SweepToken {
            key: Some(key),
            tx: self.tx.clone(),
        }
    }

    /// Stop the sweeper.
    ///
    /// Keys collected before this call are still evicted, keys collected afterwards are not.
    pub fn stop(&self) {
        self.tx.send(SweepEvent::Stop).ok();
    }

    /// Returns true once the background task has terminated.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use crate::test_utils::assert_converge_eq;

    use super::*;

    struct TestSetup {
        sweeper: Sweeper<&'static str>,
        evicted: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TestSetup {
        fn new() -> Self {
            let evicted = Arc::new(Mutex::new(Vec::new()));
            let evicted_captured = Arc::clone(&evicted);
            let sweeper = Sweeper::new(
                move |key| {
                    evicted_captured.lock().unwrap().push(key);
                },
                &Handle::current(),
            );
            Self { sweeper, evicted }
        }

        fn evicted(&self) -> Vec<&'static str> {
            self.evicted.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_token_drop_evicts() {
        let setup = TestSetup::new();

        let token = setup.sweeper.track("k1");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(setup.evicted(), Vec::<&'static str>::new());

        drop(token);
        assert_converge_eq(|| setup.evicted(), vec!["k1"]).await;
    }

    #[tokio::test]
    async fn test_eviction_order() {
        let setup = TestSetup::new();

        let t1 = setup.sweeper.track("k1");
        let t2 = setup.sweeper.track("k2");
        drop(t2);
        drop(t1);

        assert_converge_eq(|| setup.evicted(), vec!["k2", "k1"]).await;
    }

    #[tokio::test]
    async fn test_stop() {
        let setup = TestSetup::new();

        // collected before the stop, still swept
        drop(setup.sweeper.track("k1"));
        setup.sweeper.stop();
        assert_converge_eq(|| setup.sweeper.is_stopped(), true).await;
        assert_eq!(setup.evicted(), vec!["k1"]);

        // collected after the stop, ignored
        drop(setup.sweeper.track("k2"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(setup.evicted(), vec!["k1"]);
    }

    #[tokio::test]
    async fn test_stop_idempotent() {
        let setup = TestSetup::new();

        setup.sweeper.stop();
        setup.sweeper.stop();
        assert_converge_eq(|| setup.sweeper.is_stopped(), true).await;
    }
}
