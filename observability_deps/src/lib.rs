//! This crate exists to add a level of indirection between the logging crates
//! used by the rest of the workspace and the workspace members themselves, so
//! that the concrete logging stack can be swapped or upgraded in one place.
//!
//! Workspace members should use `observability_deps::tracing` instead of
//! depending on `tracing` directly.

// Export tracing with the version pinned by this crate.
pub use tracing;
