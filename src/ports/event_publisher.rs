//! EventPublisher port - hands domain events to the event bus.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Delivery is at-least-once; subscribers must tolerate duplicates.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event to every subscriber of its type.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish events in order, stopping at the first failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
