//! Rebuilds the cache snapshot from the remote after job batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::jobs::BatchOutcome;
use crate::remote::StateSource;

use super::model::{CacheSnapshot, Collection};
use super::storage::CacheStore;

/// Sole writer of the cache snapshot.
///
/// Keeps the latest snapshot in memory for reads and persists every rebuild
/// before it becomes visible. Rebuilds are full replacements and run one at
/// a time, so the last successful rebuild wins.
pub struct CacheCoordinator {
  store: CacheStore,
  source: Arc<dyn StateSource>,
  current: RwLock<CacheSnapshot>,
  loaded: AtomicBool,
  rebuild_guard: Mutex<()>,
}

impl CacheCoordinator {
  /// Load the persisted snapshot, if any, as the starting state.
  ///
  /// An unreadable snapshot is logged and treated as missing.
  pub fn initialize(store: CacheStore, source: Arc<dyn StateSource>) -> Self {
    let existing = match store.load() {
      Ok(existing) => existing,
      Err(e) => {
        error!(error = %e, "Unable to read cache at startup");
        None
      }
    };

    let loaded = existing.is_some();
    Self {
      store,
      source,
      current: RwLock::new(existing.unwrap_or_default()),
      loaded: AtomicBool::new(loaded),
      rebuild_guard: Mutex::new(()),
    }
  }

  /// Whether a snapshot has been loaded from disk or rebuilt.
  pub fn is_loaded(&self) -> bool {
    self.loaded.load(Ordering::Acquire)
  }

  pub fn snapshot(&self) -> Result<CacheSnapshot> {
    Ok(self.current.read()?.clone())
  }

  pub fn collection(&self, id: &str) -> Result<Option<Collection>> {
    Ok(self.current.read()?.collection(id).cloned())
  }

  /// Rebuild when the batch completed at least one job, even if it then
  /// halted on an error. Otherwise return the current snapshot unchanged.
  pub async fn refresh_if_needed(&self, outcome: &BatchOutcome) -> Result<CacheSnapshot> {
    if outcome.processed_count > 0 {
      self.rebuild().await
    } else {
      self.snapshot()
    }
  }

  /// Replace the snapshot with a fresh full fetch and bump the version.
  pub async fn rebuild(&self) -> Result<CacheSnapshot> {
    let _guard = self.rebuild_guard.lock().await;

    let state = self
      .source
      .fetch_full_state()
      .await
      .map_err(|e| Error::RemoteFetch(e.to_string()))?;

    let mut collections = state.collections;
    for collection in &mut collections {
      collection.sort_items();
    }

    let version = self.current.read()?.version + 1;
    let snapshot = CacheSnapshot {
      collections,
      synced_at: Some(state.synced_at),
      version,
    };

    self.store.replace(&snapshot)?;
    *self.current.write()? = snapshot.clone();
    self.loaded.store(true, Ordering::Release);

    info!(
      version,
      collections = snapshot.collections.len(),
      "Cache rebuilt"
    );
    Ok(snapshot)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{collection, item};
  use crate::remote::fake::{FakeRemote, Op};

  fn outcome(processed_count: usize, first_error: Option<Error>) -> BatchOutcome {
    BatchOutcome {
      processed_count,
      first_error,
    }
  }

  fn remote() -> Arc<FakeRemote> {
    Arc::new(FakeRemote::with_collections(vec![collection(
      "a",
      "A",
      vec![item("a2", "v2", 1, 10), item("a1", "v1", 0, 20)],
    )]))
  }

  fn coordinator(remote: Arc<FakeRemote>) -> CacheCoordinator {
    CacheCoordinator::initialize(CacheStore::open_in_memory().unwrap(), remote)
  }

  #[test]
  fn test_initialize_without_snapshot() {
    let coordinator = coordinator(remote());
    assert!(!coordinator.is_loaded());
    assert_eq!(coordinator.snapshot().unwrap(), CacheSnapshot::default());
  }

  #[test]
  fn test_initialize_from_persisted_snapshot() {
    let store = CacheStore::open_in_memory().unwrap();
    let persisted = CacheSnapshot {
      collections: vec![collection("z", "Z", vec![])],
      synced_at: None,
      version: 12,
    };
    store.replace(&persisted).unwrap();

    let coordinator = CacheCoordinator::initialize(store, remote());

    assert!(coordinator.is_loaded());
    assert_eq!(coordinator.snapshot().unwrap(), persisted);
    assert!(coordinator.collection("z").unwrap().is_some());
    assert!(coordinator.collection("a").unwrap().is_none());
  }

  #[tokio::test]
  async fn test_no_rebuild_without_processed_jobs() {
    let remote = remote();
    let coordinator = coordinator(remote.clone());

    let snapshot = coordinator.refresh_if_needed(&outcome(0, None)).await.unwrap();

    assert_eq!(snapshot.version, 0);
    assert!(remote.calls().is_empty());
  }

  #[tokio::test]
  async fn test_batch_rebuild_increments_version_once() {
    let remote = remote();
    let coordinator = coordinator(remote.clone());

    let snapshot = coordinator.refresh_if_needed(&outcome(3, None)).await.unwrap();

    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.collections.len(), 1);
    assert!(snapshot.synced_at.is_some());
    assert_eq!(remote.calls(), vec!["fetch_full_state"]);
    assert!(coordinator.is_loaded());
  }

  #[tokio::test]
  async fn test_partial_batch_still_rebuilds() {
    let coordinator = coordinator(remote());
    let failed = outcome(1, Some(Error::RemoteMutation("later job failed".into())));

    let snapshot = coordinator.refresh_if_needed(&failed).await.unwrap();

    assert_eq!(snapshot.version, 1);
  }

  #[tokio::test]
  async fn test_rebuild_sorts_items_by_position() {
    let coordinator = coordinator(remote());

    let snapshot = coordinator.rebuild().await.unwrap();

    let ids: Vec<_> = snapshot.collections[0]
      .items
      .iter()
      .map(|i| i.item_id.as_str())
      .collect();
    assert_eq!(ids, vec!["a1", "a2"]);
  }

  #[tokio::test]
  async fn test_fetch_failure_keeps_previous_snapshot() {
    let remote = remote();
    let coordinator = coordinator(remote.clone());
    let first = coordinator.rebuild().await.unwrap();
    remote.fail_next(Op::FetchState, "remote unavailable");

    let err = coordinator.rebuild().await.unwrap_err();

    assert!(matches!(err, Error::RemoteFetch(_)));
    assert_eq!(coordinator.snapshot().unwrap(), first);
  }

  #[tokio::test]
  async fn test_rebuild_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let remote = remote();

    let rebuilt = {
      let coordinator = CacheCoordinator::initialize(CacheStore::open(&path).unwrap(), remote.clone());
      coordinator.rebuild().await.unwrap();
      coordinator.rebuild().await.unwrap()
    };

    let reopened = CacheCoordinator::initialize(CacheStore::open(&path).unwrap(), remote);
    assert_eq!(rebuilt.version, 2);
    assert_eq!(reopened.snapshot().unwrap(), rebuilt);
  }
}
