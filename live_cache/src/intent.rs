//! Update intents and the join operation that merges them.

/// What kind of work is still outstanding for a key.
///
/// While a computation runs, further update requests for the same key are not queued
/// individually. Instead they are merged into a single pending intent using [`join`](Self::join),
/// so the store never runs more than one follow-up computation regardless of how many requests
/// raced.
///
/// Implementations must form a join-semilattice:
///
/// - commutative: `a.join(b) == b.join(a)`
/// - associative: `a.join(b).join(c) == a.join(b.join(c))`
/// - idempotent: `a.join(a) == a`
pub trait UpdateIntent: Copy + std::fmt::Debug + Send + Sync + 'static {
    /// Merge two intents into the one that subsumes both.
    fn join(self, other: Self) -> Self;
}

/// The two-element intent lattice used by [`LiveCache`](crate::live::LiveCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculateOrPurge {
    /// Recompute the value.
    Calculate,

    /// Drop the value, see [`Updater::update`](crate::store::Updater::update).
    Purge,
}

impl UpdateIntent for CalculateOrPurge {
    fn join(self, other: Self) -> Self {
        // purge absorbs
        match (self, other) {
            (Self::Calculate, Self::Calculate) => Self::Calculate,
            _ => Self::Purge,
        }
    }
}
