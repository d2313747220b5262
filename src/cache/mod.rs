//! Local read cache of the remote collection state.
//!
//! The cache is never patched in place. After mutations reach the remote,
//! the [`CacheCoordinator`] fetches the complete state and replaces the
//! stored [`CacheSnapshot`] wholesale, bumping its version.

mod coordinator;
mod model;
mod storage;

pub use coordinator::CacheCoordinator;
pub use model::{CacheMeta, CacheSnapshot, Collection, Item};
pub use storage::CacheStore;

#[cfg(test)]
pub(crate) use model::fixtures;
