//! In-memory remote used by tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::cache::{Collection, Item};

use super::{ActionRemote, AddedItem, FullState, RemoteError, RemoteResult, StateSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
  CreateCollection,
  DeleteCollection,
  AddItem,
  DeleteItem,
  FetchState,
}

/// Holds the next mutation until released.
#[derive(Default)]
pub struct Gate {
  entered: Notify,
  release: Notify,
}

impl Gate {
  /// Wait until a mutation is parked on this gate.
  pub async fn entered(&self) {
    self.entered.notified().await;
  }

  pub fn release(&self) {
    self.release.notify_one();
  }
}

#[derive(Default)]
struct State {
  collections: Vec<Collection>,
  next_id: u64,
  calls: Vec<String>,
  failures: HashMap<Op, VecDeque<String>>,
  omit_item_ids: bool,
}

/// Remote that applies mutations to an in-memory collection list.
#[derive(Default)]
pub struct FakeRemote {
  state: Mutex<State>,
  gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_collections(collections: Vec<Collection>) -> Self {
    let remote = Self::default();
    remote.state.lock().unwrap().collections = collections;
    remote
  }

  /// Make the next call of `op` fail with `message`.
  pub fn fail_next(&self, op: Op, message: &str) {
    self
      .state
      .lock()
      .unwrap()
      .failures
      .entry(op)
      .or_default()
      .push_back(message.to_string());
  }

  /// Stop reporting ids of added items, as a remote with an empty 201 body.
  pub fn omit_item_ids(&self) {
    self.state.lock().unwrap().omit_item_ids = true;
  }

  /// Park the next mutation until the returned gate is released.
  pub fn hold_next_mutation(&self) -> Arc<Gate> {
    let gate = Arc::new(Gate::default());
    *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
    gate
  }

  pub fn calls(&self) -> Vec<String> {
    self.state.lock().unwrap().calls.clone()
  }

  pub fn collections(&self) -> Vec<Collection> {
    self.state.lock().unwrap().collections.clone()
  }

  /// Record the call and return the injected failure, if any.
  async fn enter(&self, op: Op, call: String) -> RemoteResult<()> {
    if op != Op::FetchState {
      let gate = self.gate.lock().unwrap().take();
      if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
      }
    }

    let mut state = self.state.lock().unwrap();
    state.calls.push(call);
    match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
      Some(message) => Err(RemoteError::Rejected(message)),
      None => Ok(()),
    }
  }

  fn next_id(state: &mut State, prefix: &str) -> String {
    state.next_id += 1;
    format!("{}-{}", prefix, state.next_id)
  }
}

#[async_trait]
impl ActionRemote for FakeRemote {
  async fn create_collection(&self, title: &str, description: &str) -> RemoteResult<()> {
    self
      .enter(Op::CreateCollection, format!("create_collection:{}", title))
      .await?;
    let mut state = self.state.lock().unwrap();
    let id = Self::next_id(&mut state, "col");
    state.collections.push(Collection {
      id,
      title: title.to_string(),
      description: description.to_string(),
      items: Vec::new(),
    });
    Ok(())
  }

  async fn delete_collection(&self, collection_id: &str) -> RemoteResult<()> {
    self
      .enter(Op::DeleteCollection, format!("delete_collection:{}", collection_id))
      .await?;
    let mut state = self.state.lock().unwrap();
    let before = state.collections.len();
    state.collections.retain(|c| c.id != collection_id);
    if state.collections.len() == before {
      return Err(RemoteError::Rejected(format!("collection {} not found", collection_id)));
    }
    Ok(())
  }

  async fn add_item(
    &self,
    collection_id: &str,
    content_id: &str,
    position: Option<u32>,
  ) -> RemoteResult<Option<AddedItem>> {
    self
      .enter(Op::AddItem, format!("add_item:{}:{}", collection_id, content_id))
      .await?;
    let mut state = self.state.lock().unwrap();
    let item_id = Self::next_id(&mut state, "item");
    let reported = (!state.omit_item_ids).then(|| AddedItem {
      item_id: item_id.clone(),
    });
    let collection = state
      .collections
      .iter_mut()
      .find(|c| c.id == collection_id)
      .ok_or_else(|| RemoteError::Rejected(format!("collection {} not found", collection_id)))?;

    let index = position
      .map(|p| (p as usize).min(collection.items.len()))
      .unwrap_or(collection.items.len());
    collection.items.insert(
      index,
      Item {
        item_id: item_id.clone(),
        content_id: content_id.to_string(),
        title: format!("Content {}", content_id),
        description: String::new(),
        position: 0,
        duration_seconds: 60,
      },
    );
    for (i, item) in collection.items.iter_mut().enumerate() {
      item.position = i as u32;
    }

    Ok(reported)
  }

  async fn delete_item(&self, item_id: &str) -> RemoteResult<()> {
    self
      .enter(Op::DeleteItem, format!("delete_item:{}", item_id))
      .await?;
    let mut state = self.state.lock().unwrap();
    for collection in state.collections.iter_mut() {
      if let Some(index) = collection.items.iter().position(|i| i.item_id == item_id) {
        collection.items.remove(index);
        return Ok(());
      }
    }
    Err(RemoteError::Rejected(format!("item {} not found", item_id)))
  }
}

#[async_trait]
impl StateSource for FakeRemote {
  async fn fetch_full_state(&self) -> RemoteResult<FullState> {
    self.enter(Op::FetchState, "fetch_full_state".to_string()).await?;
    Ok(FullState {
      collections: self.collections(),
      synced_at: Utc::now(),
    })
  }
}
