//! Durable job store backed by SQLite.
//!
//! Jobs are keyed by id and ordered by an insertion sequence. Every state
//! transition is a single-row update, and multi-row operations run in one
//! transaction, so readers never see a half-applied change.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::{self, schema::JOBS_SCHEMA};
use crate::error::Result;

use super::action::JobAction;
use super::model::{Job, JobStatus, JobSummary};

/// Message recorded on jobs found running when the store is recovered.
pub const INTERRUPTED_MESSAGE: &str = "interrupted: process exited while the job was running";

const JOB_COLUMNS: &str = "id, action, payload, status, error, attempts, created_at, updated_at";

pub struct JobStore {
  conn: Mutex<Connection>,
}

impl JobStore {
  /// Open or create the job store at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open(path, JOBS_SCHEMA)?),
    })
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self {
      conn: Mutex::new(db::open_in_memory(JOBS_SCHEMA)?),
    })
  }

  /// Append a pending job for `action`.
  pub fn enqueue(&self, action: &JobAction) -> Result<Job> {
    let mut jobs = self.enqueue_all(std::slice::from_ref(action))?;
    // enqueue_all returns one job per action
    Ok(jobs.remove(0))
  }

  /// Append one pending job per action, in order.
  ///
  /// Every action is validated first; if any is invalid nothing is stored.
  pub fn enqueue_all(&self, actions: &[JobAction]) -> Result<Vec<Job>> {
    for action in actions {
      action.validate()?;
    }
    let jobs = actions.iter().map(Job::new).collect::<Result<Vec<_>>>()?;

    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare(
        "INSERT INTO jobs (id, action, payload, status, error, attempts, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      )?;
      for job in &jobs {
        stmt.execute(params![
          job.id.to_string(),
          job.action,
          serde_json::to_string(&job.payload)?,
          job.status.as_str(),
          job.error,
          job.attempts,
          timestamp(&job.created_at),
          timestamp(&job.updated_at),
        ])?;
      }
    }
    tx.commit()?;

    Ok(jobs)
  }

  /// All jobs in creation order.
  pub fn list_jobs(&self) -> Result<Vec<Job>> {
    let conn = self.conn.lock()?;
    let mut stmt = conn.prepare(&format!("SELECT {} FROM jobs ORDER BY seq", JOB_COLUMNS))?;
    let jobs = stmt
      .query_map([], job_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(jobs)
  }

  pub fn get(&self, id: Uuid) -> Result<Option<Job>> {
    let conn = self.conn.lock()?;
    let job = conn
      .query_row(
        &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
        params![id.to_string()],
        job_from_row,
      )
      .optional()?;
    Ok(job)
  }

  /// Pick the earliest job that is not complete or errored, mark it
  /// running, and count the attempt. The update is persisted before the
  /// job is returned.
  pub fn claim_next(&self) -> Result<Option<Job>> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;

    let next = tx
      .query_row(
        &format!(
          "SELECT {} FROM jobs WHERE status IN ('pending', 'running') ORDER BY seq LIMIT 1",
          JOB_COLUMNS
        ),
        [],
        job_from_row,
      )
      .optional()?;

    let Some(mut job) = next else {
      return Ok(None);
    };

    job.mark_running();
    update_state(&tx, &job)?;
    tx.commit()?;

    Ok(Some(job))
  }

  /// Persist the status, error, attempts and updated_at of `job`.
  pub fn save_state(&self, job: &Job) -> Result<()> {
    let conn = self.conn.lock()?;
    update_state(&conn, job)
  }

  /// Return every errored job to pending, keeping its attempt count.
  pub fn resume_errored(&self) -> Result<usize> {
    let conn = self.conn.lock()?;
    let count = conn.execute(
      "UPDATE jobs SET status = 'pending', error = NULL, updated_at = ? WHERE status = 'error'",
      params![timestamp(&Utc::now())],
    )?;
    Ok(count)
  }

  /// Remove every pending job. Other jobs are untouched.
  pub fn clear_pending(&self) -> Result<usize> {
    let conn = self.conn.lock()?;
    let count = conn.execute("DELETE FROM jobs WHERE status = 'pending'", [])?;
    Ok(count)
  }

  /// Mark jobs left running by a previous process as errored.
  ///
  /// Their remote mutation may or may not have been applied, so they are
  /// not retried until resumed explicitly.
  pub fn recover_interrupted(&self) -> Result<usize> {
    let conn = self.conn.lock()?;
    let count = conn.execute(
      "UPDATE jobs SET status = 'error', error = ?, updated_at = ? WHERE status = 'running'",
      params![INTERRUPTED_MESSAGE, timestamp(&Utc::now())],
    )?;
    Ok(count)
  }

  pub fn summary(&self) -> Result<JobSummary> {
    Ok(JobSummary::from_jobs(&self.list_jobs()?))
  }
}

#[cfg(test)]
impl JobStore {
  /// Rewrite a job's persisted action and payload without validation.
  pub(crate) fn overwrite_action(
    &self,
    id: Uuid,
    action: &str,
    payload: &serde_json::Value,
  ) -> Result<()> {
    let conn = self.conn.lock()?;
    conn.execute(
      "UPDATE jobs SET action = ?, payload = ? WHERE id = ?",
      params![action, payload.to_string(), id.to_string()],
    )?;
    Ok(())
  }
}

fn update_state(conn: &Connection, job: &Job) -> Result<()> {
  conn.execute(
    "UPDATE jobs SET status = ?, error = ?, attempts = ?, updated_at = ? WHERE id = ?",
    params![
      job.status.as_str(),
      job.error,
      job.attempts,
      timestamp(&job.updated_at),
      job.id.to_string(),
    ],
  )?;
  Ok(())
}

fn timestamp(at: &DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
  let id: String = row.get(0)?;
  let payload: String = row.get(2)?;
  let status: String = row.get(3)?;
  let created_at: String = row.get(6)?;
  let updated_at: String = row.get(7)?;

  Ok(Job {
    id: Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?,
    action: row.get(1)?,
    payload: serde_json::from_str(&payload).map_err(|e| conversion_error(2, e))?,
    status: status
      .parse::<JobStatus>()
      .map_err(|e| conversion_error(3, e))?,
    error: row.get(4)?,
    attempts: row.get(5)?,
    created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(6, e))?,
    updated_at: parse_timestamp(&updated_at).map_err(|e| conversion_error(7, e))?,
  })
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
  DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
