//! Integration bus - where the dispatcher hands events off.
//!
//! ```text
//!   OutboxDispatcher ──Event──▶ Publisher::publish ──ack──▶ mark delivered
//!                                  │
//!          ┌───────────────────────┼──────────────────┐
//!          ▼                       ▼                  ▼
//!    InMemoryBus             LogPublisher       (broker adapter)
//! ```
//!
//! Delivery is at-least-once; consumers wrap their handlers in
//! [`IdempotentConsumer`] or deduplicate on [`Event::id`] themselves.

mod consumer;
mod in_memory;
mod log;
mod publisher;

pub use consumer::IdempotentConsumer;
pub use in_memory::InMemoryBus;
pub use log::LogPublisher;
pub use publisher::{Event, PublishError, Publisher};
