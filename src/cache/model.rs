//! Cached collection state and derived metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One item placed in a collection.
///
/// `item_id` identifies the placement within a collection; `content_id`
/// identifies the underlying content, which may be placed in many collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
  pub item_id: String,
  pub content_id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub position: u32,
  #[serde(default)]
  pub duration_seconds: u64,
}

/// A remote collection with its items ordered by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub items: Vec<Item>,
}

impl Collection {
  /// Order items by their remote position. Stable for equal positions.
  pub fn sort_items(&mut self) {
    self.items.sort_by_key(|item| item.position);
  }

  pub fn duration_seconds(&self) -> u64 {
    self.items.iter().map(|item| item.duration_seconds).sum()
  }
}

/// Full local copy of the remote collection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
  pub collections: Vec<Collection>,
  /// When the last successful full fetch completed
  pub synced_at: Option<DateTime<Utc>>,
  /// Incremented by one on every successful rebuild
  pub version: u64,
}

impl CacheSnapshot {
  pub fn collection(&self, id: &str) -> Option<&Collection> {
    self.collections.iter().find(|c| c.id == id)
  }

  /// Summary counts for status displays.
  pub fn meta(&self) -> CacheMeta {
    CacheMeta {
      collection_count: self.collections.len(),
      item_count: self.collections.iter().map(|c| c.items.len()).sum(),
      total_duration_seconds: self.collections.iter().map(Collection::duration_seconds).sum(),
      synced_at: self.synced_at,
      version: self.version,
    }
  }

  /// Items eligible for a random pick, paired with their collection title.
  ///
  /// With a positive `target_minutes`, only items whose duration is within
  /// 10% of the target are returned.
  pub fn candidates(
    &self,
    collection_id: Option<&str>,
    target_minutes: Option<f64>,
  ) -> Vec<(&Item, &str)> {
    let window = target_minutes
      .filter(|m| m.is_finite() && *m > 0.0)
      .map(|m| {
        let target = m * 60.0;
        (target * 0.9, target * 1.1)
      });

    self
      .collections
      .iter()
      .filter(|c| collection_id.is_none_or(|id| c.id == id))
      .flat_map(|c| c.items.iter().map(move |item| (item, c.title.as_str())))
      .filter(|(item, _)| match window {
        Some((min, max)) => {
          let secs = item.duration_seconds as f64;
          secs >= min && secs <= max
        }
        None => true,
      })
      .collect()
  }
}

/// Aggregate counts describing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
  pub collection_count: usize,
  pub item_count: usize,
  pub total_duration_seconds: u64,
  pub synced_at: Option<DateTime<Utc>>,
  pub version: u64,
}
