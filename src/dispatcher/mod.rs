//! Outbox dispatcher - drains committed entries to the bus.
//!
//! ```text
//!   CommandHandler ──commit──▶ store ◀──claim_due── OutboxDispatcher ──▶ Publisher
//!         │                                                 ▲
//!         └──────────── CommitSignal (mpsc) ──▶ DispatcherThread
//! ```
//!
//! - [`OutboxDispatcher`] runs single cycles: claim, publish, record outcome.
//! - [`DispatcherThread`] loops the dispatcher on a background thread, waking
//!   on the poll interval or on a [`CommitSignal`].

mod signal;
mod thread;
mod worker;

pub use signal::CommitSignal;
pub use thread::{DispatcherThread, WorkerStats};
pub use worker::{DispatchReport, OutboxDispatcher};
