//! Event bus adapters.
//!
//! - `InMemoryEventBus` - In-process fan-out to subscribed handlers
//! - `IdempotentHandler` - Wrapper for at-most-once event processing
//! - `OutboxPublisher` - Background service moving outbox rows onto the bus

mod idempotent_handler;
mod in_memory;
mod outbox_publisher;

pub use idempotent_handler::IdempotentHandler;
pub use in_memory::InMemoryEventBus;
pub use outbox_publisher::{OutboxPublisher, OutboxPublisherConfig};
