//! Sequential executor for queued jobs.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::handlers::ActionHandlers;
use super::store::JobStore;

/// Result of one batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
  /// Jobs that reached complete during this run
  pub processed_count: usize,
  /// The failure that halted the batch, if any
  pub first_error: Option<Error>,
}

/// Drains pending jobs in creation order, one at a time.
///
/// At most one batch runs at a time per processor. A call made while a
/// batch is active returns an empty outcome immediately; jobs enqueued in
/// the meantime are picked up by the active batch.
pub struct JobProcessor {
  store: Arc<JobStore>,
  handlers: ActionHandlers,
  run_guard: Mutex<()>,
}

impl JobProcessor {
  pub fn new(store: Arc<JobStore>, handlers: ActionHandlers) -> Self {
    Self {
      store,
      handlers,
      run_guard: Mutex::new(()),
    }
  }

  /// Whether a batch is currently running.
  #[cfg(test)]
  pub fn is_running(&self) -> bool {
    self.run_guard.try_lock().is_err()
  }

  /// Run queued jobs until the queue is drained or a job fails.
  ///
  /// A failing job is recorded as errored and stops the batch; later jobs
  /// stay pending. Store failures abort the batch and are returned as `Err`.
  pub async fn process_pending(&self) -> Result<BatchOutcome> {
    let Ok(_guard) = self.run_guard.try_lock() else {
      debug!("Batch already in progress, skipping");
      return Ok(BatchOutcome::default());
    };

    let mut outcome = BatchOutcome::default();

    while let Some(mut job) = self.store.claim_next()? {
      debug!(job_id = %job.id, action = %job.action, attempts = job.attempts, "Running job");

      match self.handlers.run(&job).await {
        Ok(()) => {
          job.mark_complete();
          self.store.save_state(&job)?;
          outcome.processed_count += 1;
          debug!(job_id = %job.id, "Job complete");
        }
        Err(err) => {
          job.mark_failed(err.to_string());
          self.store.save_state(&job)?;
          warn!(job_id = %job.id, action = %job.action, error = %err, "Job failed, halting batch");
          outcome.first_error = Some(err);
          break;
        }
      }
    }

    if outcome.processed_count > 0 || outcome.first_error.is_some() {
      info!(
        processed = outcome.processed_count,
        failed = outcome.first_error.is_some(),
        "Batch finished"
      );
    }

    Ok(outcome)
  }
}
