use futures::{stream::BoxStream, StreamExt};
use observability_deps::tracing::info;
use tokio::sync::broadcast;

/// A trigger for a [reactor].
///
///
/// [reactor]: super::Reactor
pub type Trigger = BoxStream<'static, ()>;

/// Extension trait for [triggers](Trigger).
pub trait TriggerExt {
    /// Observe trigger events.
    fn observe(self, cache: &'static str, trigger: &'static str) -> Trigger;
}

impl TriggerExt for Trigger {
    fn observe(self, cache: &'static str, trigger: &'static str) -> Trigger {
        self.inspect(move |()| {
            info!(cache, trigger, "reactor triggered");
        })
        .boxed()
    }
}

/// Turn a broadcast receiver into a [`Trigger`].
///
/// The trigger ends when all senders are gone. A lagging receiver still produces an event, since
/// for a trigger only the fact that SOMETHING happened matters, not how often.
pub fn broadcast_trigger<T>(rx: broadcast::Receiver<T>) -> Trigger
where
    T: Clone + Send + 'static,
{
    futures::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => Some(((), rx)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use futures_test_utils::AssertFutureExt;

    use super::*;

    #[tokio::test]
    async fn test_broadcast_trigger() {
        let (tx, rx) = broadcast::channel::<u8>(2);
        let mut trigger = broadcast_trigger(rx);

        let mut fut_next = trigger.next();
        fut_next.assert_pending().await;

        tx.send(1).unwrap();
        assert_eq!(fut_next.poll_timeout().await, Some(()));

        // payloads are irrelevant, every send is just an event
        tx.send(2).unwrap();
        tx.send(3).unwrap();
        assert_eq!(trigger.next().poll_timeout().await, Some(()));
        assert_eq!(trigger.next().poll_timeout().await, Some(()));

        drop(tx);
        assert_eq!(trigger.next().poll_timeout().await, None);
    }

    #[tokio::test]
    async fn test_broadcast_trigger_lagged() {
        let (tx, rx) = broadcast::channel::<u8>(1);
        let mut trigger = broadcast_trigger(rx);

        // overflow the channel, the receiver lags
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();

        // lag still surfaces as an event instead of an error
        assert_eq!(trigger.next().poll_timeout().await, Some(()));
        assert_eq!(trigger.next().poll_timeout().await, Some(()));

        drop(tx);
        assert_eq!(trigger.next().poll_timeout().await, None);
    }
}
