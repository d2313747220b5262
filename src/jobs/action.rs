//! Mutations that can be queued as jobs.
//!
//! Each variant carries a typed payload. Jobs persist the action name and
//! payload JSON separately; [`JobAction::from_parts`] turns them back into a
//! typed action before dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollection {
  pub title: String,
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCollection {
  pub collection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
  pub collection_id: String,
  pub content_id: String,
  /// Explicit rank in the target collection; appended when absent
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItem {
  pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItem {
  /// Placement being moved out of its current collection
  pub item_id: String,
  pub target_collection_id: String,
  pub content_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub target_position: Option<u32>,
}

/// A queued mutation against the remote collection service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
  CreateCollection(CreateCollection),
  DeleteCollection(DeleteCollection),
  AddItem(AddItem),
  DeleteItem(DeleteItem),
  MoveItem(MoveItem),
}

impl JobAction {
  #[cfg(test)]
  pub const NAMES: [&'static str; 5] = [
    "createCollection",
    "deleteCollection",
    "addItem",
    "deleteItem",
    "moveItem",
  ];

  /// Persisted action name.
  pub fn name(&self) -> &'static str {
    match self {
      Self::CreateCollection(_) => "createCollection",
      Self::DeleteCollection(_) => "deleteCollection",
      Self::AddItem(_) => "addItem",
      Self::DeleteItem(_) => "deleteItem",
      Self::MoveItem(_) => "moveItem",
    }
  }

  /// Persisted payload.
  pub fn payload(&self) -> Result<Value> {
    let value = match self {
      Self::CreateCollection(p) => serde_json::to_value(p)?,
      Self::DeleteCollection(p) => serde_json::to_value(p)?,
      Self::AddItem(p) => serde_json::to_value(p)?,
      Self::DeleteItem(p) => serde_json::to_value(p)?,
      Self::MoveItem(p) => serde_json::to_value(p)?,
    };
    Ok(value)
  }

  /// Rebuild a typed action from a persisted name and payload.
  ///
  /// Fails with [`Error::UnknownAction`] for names no variant uses and
  /// with [`Error::Validation`] when the payload does not fit the action.
  pub fn from_parts(name: &str, payload: &Value) -> Result<Self> {
    fn decode<T: serde::de::DeserializeOwned>(name: &str, payload: &Value) -> Result<T> {
      T::deserialize(payload)
        .map_err(|e| Error::Validation(format!("invalid {} payload: {}", name, e)))
    }

    let action = match name {
      "createCollection" => Self::CreateCollection(decode(name, payload)?),
      "deleteCollection" => Self::DeleteCollection(decode(name, payload)?),
      "addItem" => Self::AddItem(decode(name, payload)?),
      "deleteItem" => Self::DeleteItem(decode(name, payload)?),
      "moveItem" => Self::MoveItem(decode(name, payload)?),
      other => return Err(Error::UnknownAction(other.to_string())),
    };
    action.validate()?;
    Ok(action)
  }

  /// Check required fields before a job is created.
  pub fn validate(&self) -> Result<()> {
    match self {
      Self::CreateCollection(p) => require("title", &p.title),
      Self::DeleteCollection(p) => require("collectionId", &p.collection_id),
      Self::AddItem(p) => {
        require("collectionId", &p.collection_id)?;
        require("contentId", &p.content_id)
      }
      Self::DeleteItem(p) => require("itemId", &p.item_id),
      Self::MoveItem(p) => {
        require("itemId", &p.item_id)?;
        require("targetCollectionId", &p.target_collection_id)?;
        require("contentId", &p.content_id)
      }
    }
  }
}

fn require(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{} is required", field)));
  }
  Ok(())
}
