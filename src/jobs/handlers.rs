//! Dispatch from job actions to remote mutations.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::remote::{ActionRemote, RemoteError};

use super::action::{JobAction, MoveItem};
use super::model::Job;

/// Runs the remote mutation for each kind of job.
#[derive(Clone)]
pub struct ActionHandlers {
  remote: Arc<dyn ActionRemote>,
}

impl ActionHandlers {
  pub fn new(remote: Arc<dyn ActionRemote>) -> Self {
    Self { remote }
  }

  /// Decode the job's action and execute it against the remote.
  pub async fn run(&self, job: &Job) -> Result<()> {
    let action = job.decode_action()?;
    self.dispatch(action).await
  }

  pub async fn dispatch(&self, action: JobAction) -> Result<()> {
    match action {
      JobAction::CreateCollection(p) => {
        self
          .remote
          .create_collection(&p.title, &p.description)
          .await
          .map_err(mutation_error)?;
      }
      JobAction::DeleteCollection(p) => {
        self
          .remote
          .delete_collection(&p.collection_id)
          .await
          .map_err(mutation_error)?;
      }
      JobAction::AddItem(p) => {
        self
          .remote
          .add_item(&p.collection_id, &p.content_id, p.position)
          .await
          .map_err(mutation_error)?;
      }
      JobAction::DeleteItem(p) => {
        self
          .remote
          .delete_item(&p.item_id)
          .await
          .map_err(mutation_error)?;
      }
      JobAction::MoveItem(p) => self.move_item(&p).await?,
    }
    Ok(())
  }

  /// Move an item by adding it to the target then deleting the original.
  ///
  /// Not atomic. If the delete fails, one compensating delete of the new
  /// placement is attempted; if that fails too, or the remote never reported
  /// the new placement's id, the content is left in both collections. Either
  /// way the original delete failure is returned.
  async fn move_item(&self, p: &MoveItem) -> Result<()> {
    let added = self
      .remote
      .add_item(&p.target_collection_id, &p.content_id, p.target_position)
      .await
      .map_err(mutation_error)?;
    debug!(
      item_id = %p.item_id,
      new_item_id = ?added.as_ref().map(|a| a.item_id.as_str()),
      target = %p.target_collection_id,
      "Added item to move target"
    );

    let Err(delete_err) = self.remote.delete_item(&p.item_id).await else {
      return Ok(());
    };

    match added {
      Some(added) => {
        if let Err(cleanup_err) = self.remote.delete_item(&added.item_id).await {
          warn!(
            item_id = %p.item_id,
            new_item_id = %added.item_id,
            error = %cleanup_err,
            "Failed to clean up newly added item after move failure; content is now in both collections"
          );
        }
      }
      None => warn!(
        item_id = %p.item_id,
        target = %p.target_collection_id,
        "New item id unknown, cannot clean up after move failure; content is now in both collections"
      ),
    }

    Err(mutation_error(delete_err))
  }
}

fn mutation_error(err: RemoteError) -> Error {
  Error::RemoteMutation(err.to_string())
}
