//! Interfaces to the authoritative remote collection service.
//!
//! The core never talks to the remote API directly. It goes through two
//! narrow capabilities:
//! - [`ActionRemote`] performs single mutations (used by job handlers)
//! - [`StateSource`] returns the complete current state (used for rebuilds)

pub mod http;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Collection;

/// Errors reported by a remote collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("remote returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("unexpected response: {0}")]
  Decode(String),

  /// The remote refused the operation for a domain reason.
  #[error("{0}")]
  Rejected(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// An item created on the remote by an add.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
  pub item_id: String,
}

/// Complete remote state as returned by a full fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
  pub collections: Vec<Collection>,
  pub synced_at: DateTime<Utc>,
}

/// Single-mutation calls against the remote system.
#[async_trait]
pub trait ActionRemote: Send + Sync {
  async fn create_collection(&self, title: &str, description: &str) -> RemoteResult<()>;

  async fn delete_collection(&self, collection_id: &str) -> RemoteResult<()>;

  /// Place content into a collection, optionally at an explicit rank.
  ///
  /// Returns the new placement when the remote reports its id.
  async fn add_item(
    &self,
    collection_id: &str,
    content_id: &str,
    position: Option<u32>,
  ) -> RemoteResult<Option<AddedItem>>;

  async fn delete_item(&self, item_id: &str) -> RemoteResult<()>;
}

/// Source of the complete remote state.
#[async_trait]
pub trait StateSource: Send + Sync {
  async fn fetch_full_state(&self) -> RemoteResult<FullState>;
}
