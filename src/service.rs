//! Entry point tying the job queue to the cache.
//!
//! Every mutation follows the same path: enqueue jobs, drain the queue, then
//! rebuild the cache if anything completed. Callers get back the refreshed
//! snapshot together with the failure that halted the batch, if any.

use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheCoordinator, CacheMeta, CacheSnapshot, CacheStore, Collection, Item};
use crate::error::{Error, Result};
use crate::jobs::{
  ActionHandlers, AddItem, CreateCollection, DeleteCollection, DeleteItem, Job, JobAction,
  JobProcessor, JobStore, JobSummary, MoveItem,
};
use crate::remote::{ActionRemote, StateSource};

const JOBS_DB: &str = "jobs.db";
const CACHE_DB: &str = "cache.db";

/// Outcome of a mutation request.
#[derive(Debug)]
pub struct SyncReport {
  /// Cache state after the batch, rebuilt if any job completed
  pub snapshot: CacheSnapshot,
  pub processed_count: usize,
  /// The failure that halted the batch
  pub error: Option<Error>,
}

impl SyncReport {
  pub fn into_result(self) -> Result<CacheSnapshot> {
    match self.error {
      Some(err) => Err(err),
      None => Ok(self.snapshot),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
  pub cache_loaded: bool,
  pub meta: CacheMeta,
  pub jobs: JobSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedItem {
  #[serde(flatten)]
  pub item: Item,
  pub collection_title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomPick {
  pub item: Option<PickedItem>,
  /// Number of items the pick was drawn from
  pub candidates: usize,
}

pub struct SyncService {
  jobs: Arc<JobStore>,
  processor: JobProcessor,
  cache: CacheCoordinator,
}

impl SyncService {
  /// Open the stores under `data_dir` and bring the service up.
  pub fn start(
    data_dir: &Path,
    actions: Arc<dyn ActionRemote>,
    source: Arc<dyn StateSource>,
  ) -> Result<Self> {
    let jobs = JobStore::open(&data_dir.join(JOBS_DB))?;
    let cache = CacheStore::open(&data_dir.join(CACHE_DB))?;
    Self::with_stores(jobs, cache, actions, source)
  }

  /// Recover interrupted jobs and load the cache. Never contacts the remote.
  pub fn with_stores(
    jobs: JobStore,
    cache: CacheStore,
    actions: Arc<dyn ActionRemote>,
    source: Arc<dyn StateSource>,
  ) -> Result<Self> {
    let recovered = jobs.recover_interrupted()?;
    if recovered > 0 {
      warn!(recovered, "Found jobs interrupted mid-run, marked as errored until resumed");
    }

    let jobs = Arc::new(jobs);
    Ok(Self {
      processor: JobProcessor::new(jobs.clone(), ActionHandlers::new(actions)),
      jobs,
      cache: CacheCoordinator::initialize(cache, source),
    })
  }

  /// Run jobs left pending by an earlier session before new work is queued.
  ///
  /// A halted batch or failed rebuild is logged and left for the caller's own
  /// request to report. Only store failures are returned.
  pub async fn drain_leftovers(&self) -> Result<()> {
    match self.process_and_refresh().await {
      Ok(SyncReport {
        error: Some(err), ..
      }) => warn!(error = %err, "Leftover jobs halted"),
      Ok(report) if report.processed_count > 0 => {
        info!(processed = report.processed_count, "Drained leftover jobs")
      }
      Ok(_) => {}
      Err(err) if err.is_store_error() => return Err(err),
      Err(err) => warn!(error = %err, "Refresh after leftover jobs failed"),
    }
    Ok(())
  }

  /// Queue `actions` as one request and run them.
  ///
  /// Nothing is queued if any action is invalid.
  pub async fn submit(&self, actions: Vec<JobAction>) -> Result<SyncReport> {
    let queued = self.jobs.enqueue_all(&actions)?;
    info!(count = queued.len(), "Queued jobs");
    self.process_and_refresh().await
  }

  pub async fn create_collection(&self, title: &str, description: &str) -> Result<SyncReport> {
    self
      .submit(vec![JobAction::CreateCollection(CreateCollection {
        title: title.to_string(),
        description: description.to_string(),
      })])
      .await
  }

  pub async fn delete_collection(&self, collection_id: &str) -> Result<SyncReport> {
    self
      .submit(vec![JobAction::DeleteCollection(DeleteCollection {
        collection_id: collection_id.to_string(),
      })])
      .await
  }

  pub async fn add_item(
    &self,
    collection_id: &str,
    content_id: &str,
    position: Option<u32>,
  ) -> Result<SyncReport> {
    self
      .submit(vec![JobAction::AddItem(AddItem {
        collection_id: collection_id.to_string(),
        content_id: content_id.to_string(),
        position,
      })])
      .await
  }

  /// Remove several items, one job per item.
  pub async fn remove_items(&self, item_ids: Vec<String>) -> Result<SyncReport> {
    if item_ids.is_empty() {
      return Err(Error::Validation("at least one item is required".into()));
    }
    let actions = item_ids
      .into_iter()
      .map(|item_id| JobAction::DeleteItem(DeleteItem { item_id }))
      .collect();
    self.submit(actions).await
  }

  /// Move several items, one job per move.
  pub async fn move_items(&self, moves: Vec<MoveItem>) -> Result<SyncReport> {
    if moves.is_empty() {
      return Err(Error::Validation("at least one move is required".into()));
    }
    self.submit(moves.into_iter().map(JobAction::MoveItem).collect()).await
  }

  /// Make errored jobs pending again and run the queue.
  pub async fn resume(&self) -> Result<SyncReport> {
    let resumed = self.jobs.resume_errored()?;
    info!(resumed, "Resuming errored jobs");
    self.process_and_refresh().await
  }

  /// Drop jobs that never started and run whatever is left.
  pub async fn clear_pending(&self) -> Result<SyncReport> {
    let cleared = self.jobs.clear_pending()?;
    info!(cleared, "Cleared pending jobs");
    self.process_and_refresh().await
  }

  /// Rebuild the cache regardless of job activity.
  pub async fn refresh(&self) -> Result<CacheSnapshot> {
    self.cache.rebuild().await
  }

  pub fn status(&self) -> Result<ServiceStatus> {
    Ok(ServiceStatus {
      cache_loaded: self.cache.is_loaded(),
      meta: self.cache.snapshot()?.meta(),
      jobs: self.jobs.summary()?,
    })
  }

  pub fn list_jobs(&self) -> Result<Vec<Job>> {
    self.jobs.list_jobs()
  }

  pub fn job(&self, id: Uuid) -> Result<Option<Job>> {
    self.jobs.get(id)
  }

  pub fn collections(&self) -> Result<Vec<Collection>> {
    Ok(self.cache.snapshot()?.collections)
  }

  pub fn collection(&self, id: &str) -> Result<Option<Collection>> {
    self.cache.collection(id)
  }

  /// Pick a cached item uniformly at random.
  ///
  /// `collection_id` limits the pick to one collection. A positive
  /// `target_minutes` limits it to items within 10% of that duration.
  pub fn random_item(
    &self,
    collection_id: Option<&str>,
    target_minutes: Option<f64>,
  ) -> Result<RandomPick> {
    let snapshot = self.cache.snapshot()?;
    let candidates = snapshot.candidates(collection_id, target_minutes);

    let item = if candidates.is_empty() {
      None
    } else {
      let (item, collection_title) = candidates[rand::rng().random_range(0..candidates.len())];
      Some(PickedItem {
        item: item.clone(),
        collection_title: collection_title.to_string(),
      })
    };

    Ok(RandomPick {
      item,
      candidates: candidates.len(),
    })
  }

  async fn process_and_refresh(&self) -> Result<SyncReport> {
    let outcome = self.processor.process_pending().await?;
    let snapshot = self.cache.refresh_if_needed(&outcome).await?;
    Ok(SyncReport {
      snapshot,
      processed_count: outcome.processed_count,
      error: outcome.first_error,
    })
  }
}
