//! React to external change events.

use futures::StreamExt;
use reaction::Reaction;
use tokio::{runtime::Handle, task::JoinSet};
use trigger::Trigger;

pub mod reaction;
pub mod trigger;

/// React to [triggers](Trigger) by a [reaction](Reaction).
///
/// The reaction (and everything it owns) is dropped once all triggers ended or the reactor is
/// dropped, whichever comes first.
#[derive(Debug)]
pub struct Reactor {
    _task: JoinSet<()>,
}

impl Reactor {
    /// Create new reactor given the triggers and a single reaction.
    ///
    /// The handle is used to run this in a background task.
    pub fn new(
        triggers: impl IntoIterator<Item = Trigger>,
        reaction: impl Reaction,
        handle: &Handle,
    ) -> Self {
        let mut task = JoinSet::new();
        let mut triggers = futures::stream::select_all(triggers);
        task.spawn_on(
            async move {
                let reaction = reaction;

                while let Some(()) = triggers.next().await {
                    // an observer should make sense of the result
                    reaction.exec().await.ok();
                }
            },
            handle,
        );

        Self { _task: task }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use futures::{future::BoxFuture, FutureExt};

    use crate::{interfaces::DynError, test_utils::assert_converge_eq};

    use super::*;

    #[derive(Debug, Default)]
    struct CountingReaction {
        count: AtomicUsize,
    }

    impl Reaction for Arc<CountingReaction> {
        fn exec(&self) -> BoxFuture<'_, Result<(), DynError>> {
            async move {
                self.count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_reacts_to_every_trigger() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let trigger = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|()| ((), rx))
        })
        .boxed();

        let reaction = Arc::new(CountingReaction::default());
        let _reactor = Reactor::new([trigger], Arc::clone(&reaction), &Handle::current());

        tx.send(()).unwrap();
        assert_converge_eq(|| reaction.count.load(Ordering::SeqCst), 1).await;

        tx.send(()).unwrap();
        tx.send(()).unwrap();
        assert_converge_eq(|| reaction.count.load(Ordering::SeqCst), 3).await;
    }

    #[tokio::test]
    async fn test_reaction_dropped_when_triggers_end() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let trigger = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|()| ((), rx))
        })
        .boxed();

        let reaction = Arc::new(CountingReaction::default());
        let _reactor = Reactor::new([trigger], Arc::clone(&reaction), &Handle::current());
        assert_eq!(Arc::strong_count(&reaction), 2);

        drop(tx);
        assert_converge_eq(|| Arc::strong_count(&reaction), 1).await;
    }

    #[tokio::test]
    async fn test_drop_stops_reacting() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<()>();
        let trigger = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|()| ((), rx))
        })
        .boxed();

        let reaction = Arc::new(CountingReaction::default());
        let reactor = Reactor::new([trigger], Arc::clone(&reaction), &Handle::current());

        tx.send(()).unwrap();
        assert_converge_eq(|| reaction.count.load(Ordering::SeqCst), 1).await;

        drop(reactor);
        assert_converge_eq(|| Arc::strong_count(&reaction), 1).await;

        tx.send(()).ok();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(reaction.count.load(Ordering::SeqCst), 1);
    }
}
