//! EventSubscriber port - registration of event handlers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for processing domain events.
///
/// Handlers must be idempotent; the outbox may redeliver.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name for logging and idempotency tracking.
    fn name(&self) -> &'static str;
}

/// Port for subscribing to domain events by type.
///
/// ```ignore
/// bus.subscribe_all(&[CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED], dispatcher);
/// ```
pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}

/// Combined publishing and subscribing.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
