//! A few shared types.

use std::sync::Arc;

/// Dynamic error type.
pub type DynError = Arc<dyn std::error::Error + Send + Sync>;

/// Result of a single update computation.
///
/// `Ok(None)` means "there is no value for this key (anymore)", see
/// [`Updater::update`](crate::store::Updater::update).
pub type UpdateResult<V> = Result<Option<Arc<V>>, DynError>;
