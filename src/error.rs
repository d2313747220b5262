//! Error types for the job queue and cache synchronization core.

use thiserror::Error;

/// Errors raised by the job store, processor, and cache coordinator.
#[derive(Debug, Error)]
pub enum Error {
  /// A mutation request was malformed and no job was created for it.
  #[error("validation failed: {0}")]
  Validation(String),

  /// A persisted job names an action this build does not know how to run.
  #[error("unknown job action: {0}")]
  UnknownAction(String),

  /// The remote system rejected or failed a mutation.
  #[error("{0}")]
  RemoteMutation(String),

  /// Fetching the full remote state failed.
  #[error("failed to fetch remote state: {0}")]
  RemoteFetch(String),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store lock poisoned")]
  LockPoisoned,
}

impl Error {
  /// Whether this error came from reading or writing a durable store.
  pub fn is_store_error(&self) -> bool {
    matches!(
      self,
      Self::Database(_) | Self::Io(_) | Self::Serialization(_) | Self::LockPoisoned
    )
  }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    Self::LockPoisoned
  }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
