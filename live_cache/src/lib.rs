//! Invalidating compute cache.
//!
//! # Design
//! There are the following components:
//!
//! - [`FutureStore`]: Maps keys to [shared futures] that resolve to computed values. Guarantees
//!   at most one running computation per key and merges concurrent update requests via
//!   [intents](intent::UpdateIntent).
//! - [`Hook`]: Can react to state changes of the store. Implements logging and serves as a test
//!   instrument.
//! - [`Reactor`]: Turns change-event streams ([triggers](reactor::trigger::Trigger)) of an owner
//!   object into update requests. Implemented as background task so users don't need to drive
//!   that themselves.
//! - [`Sweeper`]: Removes entries whose owner object was dropped. A background task blocks on a
//!   queue of collected keys; a poison pill terminates it.
//! - [`LiveCache`]: Ties the pieces together for a concrete key/owner/value combination.
//!
//! ```text
//!   +-----------+                          +------+
//!   | LiveCache |--(registers & reads)     | Hook |
//!   +-----------+          |                 ^
//!     |        |           v                 |
//!     |        |     +-------------+         |
//!     |        +---->| FutureStore |-(informs)
//!     |              +-------------+
//!     |                 ^        ^
//!  (tracks owners)      |        |
//!     |          (recomputes) (removes)
//!     v                 |        |
//!   +---------+         |    +---------+
//!   | Reactor |---------+    | Sweeper |
//!   +---------+              +---------+
//!        |                        ^
//!        +---(token drop on owner collection)
//! ```
//!
//!
//! [`FutureStore`]: self::store::FutureStore
//! [`Hook`]: self::hook::Hook
//! [`LiveCache`]: self::live::LiveCache
//! [`Reactor`]: self::reactor::Reactor
//! [`Sweeper`]: self::sweeper::Sweeper
//! [shared futures]: futures::future::Shared

pub mod hook;
pub mod intent;
pub mod interfaces;
pub mod live;
pub mod reactor;
pub mod store;
pub mod sweeper;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use interfaces::{DynError, UpdateResult};
