use std::sync::Weak;

use futures::future::BoxFuture;
use observability_deps::tracing::{debug, warn};

use crate::interfaces::DynError;

/// Reaction to a [trigger].
///
///
/// [trigger]: super::trigger::Trigger
pub trait Reaction: Send + Sync + 'static {
    fn exec(&self) -> BoxFuture<'_, Result<(), DynError>>;
}

impl<T> Reaction for Weak<T>
where
    T: Reaction + Sync,
{
    fn exec(&self) -> BoxFuture<'_, Result<(), DynError>> {
        Box::pin(async {
            let Some(inner) = self.upgrade() else {
                return Ok(());
            };
            inner.exec().await
        })
    }
}

/// Extension trait for [reactions](Reaction).
pub trait ReactionExt {
    /// Place reaction into a box and erase types.
    fn boxed(self) -> Box<dyn Reaction>;

    /// Observe reaction events.
    fn observe(self, cache: &'static str) -> impl Reaction;
}

impl<T> ReactionExt for T
where
    T: Reaction,
{
    fn boxed(self) -> Box<dyn Reaction> {
        Box::new(self)
    }

    fn observe(self, cache: &'static str) -> impl Reaction {
        Observer {
            cache,
            inner: self.boxed(),
        }
    }
}

/// Helper for [`ReactionExt::observe`]
struct Observer {
    cache: &'static str,
    inner: Box<dyn Reaction>,
}

impl Reaction for Observer {
    fn exec(&self) -> BoxFuture<'_, Result<(), DynError>> {
        Box::pin(async {
            let res = self.inner.exec().await;

            match &res {
                Ok(()) => {
                    debug!(cache = self.cache, "reaction executed");
                }
                Err(e) => {
                    warn!(cache = self.cache, %e, "reaction failed to execute");
                }
            }

            res
        })
    }
}
