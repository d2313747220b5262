use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::action::JobAction;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
  Pending,
  Running,
  Complete,
  Error,
}

impl JobStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Complete => "complete",
      Self::Error => "error",
    }
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for JobStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "running" => Ok(Self::Running),
      "complete" => Ok(Self::Complete),
      "error" => Ok(Self::Error),
      other => Err(Error::Validation(format!("unknown job status: {}", other))),
    }
  }
}

/// A durable record of one requested mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
  pub id: Uuid,
  pub action: String,
  pub payload: Value,
  pub status: JobStatus,
  /// Present only when status is error
  pub error: Option<String>,
  pub attempts: u32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Job {
  /// Build a new pending job for `action`.
  pub fn new(action: &JobAction) -> Result<Self> {
    let now = Utc::now();
    Ok(Self {
      id: Uuid::new_v4(),
      action: action.name().to_string(),
      payload: action.payload()?,
      status: JobStatus::Pending,
      error: None,
      attempts: 0,
      created_at: now,
      updated_at: now,
    })
  }

  /// Decode the persisted action name and payload.
  pub fn decode_action(&self) -> Result<JobAction> {
    JobAction::from_parts(&self.action, &self.payload)
  }

  pub fn mark_running(&mut self) {
    self.status = JobStatus::Running;
    self.attempts += 1;
    self.error = None;
    self.updated_at = Utc::now();
  }

  pub fn mark_complete(&mut self) {
    self.status = JobStatus::Complete;
    self.error = None;
    self.updated_at = Utc::now();
  }

  pub fn mark_failed(&mut self, message: impl Into<String>) {
    self.status = JobStatus::Error;
    self.error = Some(message.into());
    self.updated_at = Utc::now();
  }
}

/// Job counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
  pub total: usize,
  pub pending: usize,
  pub running: usize,
  pub errors: usize,
  /// Every job that has not reached complete
  pub incomplete: usize,
}

impl JobSummary {
  pub fn from_jobs(jobs: &[Job]) -> Self {
    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    Self {
      total: jobs.len(),
      pending: count(JobStatus::Pending),
      running: count(JobStatus::Running),
      errors: count(JobStatus::Error),
      incomplete: jobs.len() - count(JobStatus::Complete),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jobs::action::DeleteItem;

  fn job() -> Job {
    Job::new(&JobAction::DeleteItem(DeleteItem {
      item_id: "pi-9".into(),
    }))
    .unwrap()
  }

  #[test]
  fn test_new_job_is_pending() {
    let job = job();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.error, None);
    assert_eq!(job.action, "deleteItem");
    assert_eq!(job.created_at, job.updated_at);
  }

  #[test]
  fn test_transitions_keep_error_consistent() {
    let mut job = job();
    job.mark_running();
    assert_eq!(job.attempts, 1);
    assert_eq!(job.status, JobStatus::Running);

    job.mark_failed("boom");
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("boom"));

    job.mark_running();
    assert_eq!(job.attempts, 2);
    assert_eq!(job.error, None);

    job.mark_complete();
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.error, None);
  }

  #[test]
  fn test_status_parse() {
    for status in [
      JobStatus::Pending,
      JobStatus::Running,
      JobStatus::Complete,
      JobStatus::Error,
    ] {
      assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
    }
    assert!("paused".parse::<JobStatus>().is_err());
  }

  #[test]
  fn test_summary_counts() {
    let mut done = job();
    done.mark_complete();
    let mut failed = job();
    failed.mark_failed("x");
    let jobs = vec![job(), done, failed];

    let summary = JobSummary::from_jobs(&jobs);
    assert_eq!(
      summary,
      JobSummary {
        total: 3,
        pending: 1,
        running: 0,
        errors: 1,
        incomplete: 2,
      }
    );
  }
}
