//! Durable queue of remote mutations.
//!
//! Mutations are recorded as jobs before they are executed, so a request that
//! fails part-way through leaves a visible trail that can be resumed or
//! cleared later:
//! - [`JobStore`] persists jobs and their state transitions
//! - [`JobProcessor`] drains pending jobs in order, halting on the first failure
//! - [`ActionHandlers`] maps each [`JobAction`] to its remote call(s)

mod action;
mod handlers;
mod model;
mod processor;
mod store;

pub use action::{AddItem, CreateCollection, DeleteCollection, DeleteItem, JobAction, MoveItem};
pub use handlers::ActionHandlers;
pub use model::{Job, JobStatus, JobSummary};
pub use processor::{BatchOutcome, JobProcessor};
pub use store::{JobStore, INTERRUPTED_MESSAGE};
