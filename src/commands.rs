//! Command-line subcommands and their dispatch onto the service.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Report, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::CacheMeta;
use crate::jobs::MoveItem;
use crate::service::{SyncReport, SyncService};

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
  /// Show cache metadata and job counts
  Status,
  /// List cached collections, or show one
  Collections { id: Option<String> },
  /// List all jobs in creation order, or show one
  Jobs { id: Option<Uuid> },
  /// Create a collection
  Create {
    title: String,
    #[arg(short, long, default_value = "")]
    description: String,
  },
  /// Delete a collection
  DeleteCollection { id: String },
  /// Add content to a collection
  Add {
    collection: String,
    content: String,
    /// Rank in the collection (appended when omitted)
    #[arg(short, long)]
    position: Option<u32>,
  },
  /// Remove items by item id
  Remove {
    #[arg(required = true)]
    items: Vec<String>,
  },
  /// Move an item to another collection
  Move {
    item: String,
    /// Target collection id
    #[arg(long)]
    to: String,
    /// Content id of the item being moved
    #[arg(long)]
    content: String,
    #[arg(short, long)]
    position: Option<u32>,
  },
  /// Retry errored jobs
  Resume,
  /// Drop jobs that have not started
  ClearPending,
  /// Rebuild the cache from the remote
  Refresh,
  /// Pick a random cached item
  Random {
    #[arg(long)]
    collection: Option<String>,
    /// Target duration; only items within 10% qualify
    #[arg(short, long)]
    minutes: Option<f64>,
  },
}

impl Command {
  /// Whether the command queues new jobs. Leftover jobs from earlier
  /// invocations run first for these, and only for these.
  fn queues_jobs(&self) -> bool {
    matches!(
      self,
      Self::Create { .. }
        | Self::DeleteCollection { .. }
        | Self::Add { .. }
        | Self::Remove { .. }
        | Self::Move { .. }
        | Self::Resume
    )
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MutationOutput {
  processed: usize,
  meta: CacheMeta,
}

/// Run `command` and print its result as JSON on stdout.
pub async fn run(service: &SyncService, command: Command) -> Result<()> {
  if command.queues_jobs() {
    service.drain_leftovers().await?;
  }

  match command {
    Command::Status => print_json(&service.status()?),
    Command::Collections { id: None } => print_json(&service.collections()?),
    Command::Collections { id: Some(id) } => {
      let collection = service
        .collection(&id)?
        .ok_or_else(|| eyre!("Collection not found in cache: {}", id))?;
      print_json(&collection)
    }
    Command::Jobs { id: None } => print_json(&service.list_jobs()?),
    Command::Jobs { id: Some(id) } => {
      let job = service.job(id)?.ok_or_else(|| eyre!("Job not found: {}", id))?;
      print_json(&job)
    }
    Command::Create { title, description } => {
      finish(service.create_collection(&title, &description).await?)
    }
    Command::DeleteCollection { id } => finish(service.delete_collection(&id).await?),
    Command::Add {
      collection,
      content,
      position,
    } => finish(service.add_item(&collection, &content, position).await?),
    Command::Remove { items } => finish(service.remove_items(items).await?),
    Command::Move {
      item,
      to,
      content,
      position,
    } => {
      let report = service
        .move_items(vec![MoveItem {
          item_id: item,
          target_collection_id: to,
          content_id: content,
          target_position: position,
        }])
        .await?;
      finish(report)
    }
    Command::Resume => finish(service.resume().await?),
    Command::ClearPending => finish(service.clear_pending().await?),
    Command::Refresh => print_json(&service.refresh().await?.meta()),
    Command::Random { collection, minutes } => {
      print_json(&service.random_item(collection.as_deref(), minutes)?)
    }
  }
}

/// Print the refreshed cache state, then surface the batch failure.
fn finish(report: SyncReport) -> Result<()> {
  print_json(&MutationOutput {
    processed: report.processed_count,
    meta: report.snapshot.meta(),
  })?;

  report
    .into_result()
    .map(|_| ())
    .map_err(|err| Report::new(err).wrap_err("Job batch halted; see `collsync jobs`"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::fixtures::{collection, item};
  use crate::cache::CacheStore;
  use crate::jobs::{DeleteItem, JobAction, JobStatus, JobStore};
  use crate::remote::fake::{FakeRemote, Op};
  use clap::Parser;
  use std::sync::Arc;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(std::iter::once("collsync").chain(args.iter().copied()))
      .unwrap()
      .command
  }

  fn service(remote: Arc<FakeRemote>) -> SyncService {
    service_with_jobs(remote, JobStore::open_in_memory().unwrap())
  }

  fn service_with_jobs(remote: Arc<FakeRemote>, jobs: JobStore) -> SyncService {
    SyncService::with_stores(jobs, CacheStore::open_in_memory().unwrap(), remote.clone(), remote)
      .unwrap()
  }

  fn leftover_delete(item_id: &str) -> JobStore {
    let jobs = JobStore::open_in_memory().unwrap();
    jobs
      .enqueue(&JobAction::DeleteItem(DeleteItem {
        item_id: item_id.into(),
      }))
      .unwrap();
    jobs
  }

  fn library() -> Arc<FakeRemote> {
    Arc::new(FakeRemote::with_collections(vec![
      collection("a", "A", vec![item("x", "vx", 0, 60)]),
      collection("b", "B", vec![]),
    ]))
  }

  #[test]
  fn test_parse_move() {
    assert_eq!(
      parse(&["move", "item-1", "--to", "col-2", "--content", "c9", "-p", "3"]),
      Command::Move {
        item: "item-1".into(),
        to: "col-2".into(),
        content: "c9".into(),
        position: Some(3),
      }
    );
  }

  #[test]
  fn test_parse_remove_many() {
    assert_eq!(
      parse(&["remove", "a", "b"]),
      Command::Remove {
        items: vec!["a".into(), "b".into()]
      }
    );
  }

  #[test]
  fn test_remove_requires_items() {
    assert!(Cli::try_parse_from(["collsync", "remove"]).is_err());
  }

  #[test]
  fn test_parse_kebab_case_names() {
    assert_eq!(parse(&["clear-pending"]), Command::ClearPending);
    assert_eq!(parse(&["jobs"]), Command::Jobs { id: None });
    assert_eq!(
      parse(&["delete-collection", "col-1"]),
      Command::DeleteCollection { id: "col-1".into() }
    );
    assert_eq!(
      parse(&["create", "Focus", "-d", "Deep work"]),
      Command::Create {
        title: "Focus".into(),
        description: "Deep work".into(),
      }
    );
  }

  #[tokio::test]
  async fn test_run_surfaces_batch_error() {
    let remote = library();
    let service = service(remote.clone());
    remote.fail_next(Op::DeleteItem, "locked");

    let err = run(
      &service,
      Command::Remove {
        items: vec!["x".into()],
      },
    )
    .await
    .unwrap_err();

    assert!(format!("{:?}", err).contains("locked"));
  }

  #[tokio::test]
  async fn test_read_commands_leave_queue_alone() {
    let remote = library();
    let service = service_with_jobs(remote.clone(), leftover_delete("x"));

    for command in [
      Command::Status,
      Command::Jobs { id: None },
      Command::Collections { id: None },
      Command::Random {
        collection: None,
        minutes: None,
      },
    ] {
      run(&service, command).await.unwrap();
    }

    assert_eq!(service.list_jobs().unwrap()[0].status, JobStatus::Pending);
    assert!(remote.calls().is_empty());
  }

  #[tokio::test]
  async fn test_clear_pending_does_not_run_leftovers() {
    let remote = library();
    let service = service_with_jobs(remote.clone(), leftover_delete("x"));

    run(&service, Command::ClearPending).await.unwrap();

    assert!(service.list_jobs().unwrap().is_empty());
    assert!(remote.calls().is_empty());
  }

  #[tokio::test]
  async fn test_mutation_runs_leftovers_first() {
    let remote = library();
    let service = service_with_jobs(remote.clone(), leftover_delete("x"));

    run(
      &service,
      Command::Create {
        title: "Later".into(),
        description: String::new(),
      },
    )
    .await
    .unwrap();

    assert_eq!(
      remote.calls(),
      vec![
        "delete_item:x",
        "fetch_full_state",
        "create_collection:Later",
        "fetch_full_state"
      ]
    );
  }

  #[test]
  fn test_jobs_rejects_malformed_id() {
    assert!(Cli::try_parse_from(["collsync", "jobs", "not-a-uuid"]).is_err());
  }

  #[tokio::test]
  async fn test_run_unknown_collection() {
    let service = service(Arc::new(FakeRemote::new()));

    let err = run(&service, Command::Collections { id: Some("nope".into()) })
      .await
      .unwrap_err();

    assert!(err.to_string().contains("nope"));
  }
}
