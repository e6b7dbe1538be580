//! Small helpers to poke at [futures](Future) in tests.

use std::{future::Future, time::Duration};

use futures_concurrency::future::FutureExt as _;

/// Helper trait for asserting the state of a future.
pub trait AssertFutureExt {
    /// The output type
    type Output;

    /// Panics if the future does not return [`Poll::Pending`](std::task::Poll::Pending)
    fn assert_pending(&mut self) -> impl Future<Output = ()>;

    /// Polls with a timeout
    fn poll_timeout(self) -> impl Future<Output = Self::Output>;
}

impl<F> AssertFutureExt for F
where
    F: Future + Send + Unpin,
{
    type Output = F::Output;

    async fn assert_pending(&mut self) {
        let this = async {
            self.await;
            true
        };
        let timeout = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            false
        };
        let was_this = this.race(timeout).await;
        if was_this {
            panic!("not pending")
        }
    }

    async fn poll_timeout(self) -> Self::Output {
        tokio::time::timeout(Duration::from_millis(10), self)
            .await
            .expect("timeout")
    }
}
