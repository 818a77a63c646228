//! IdempotentHandler - Wrapper for ensuring at-most-once event processing.
//!
//! This adapter wraps any `EventHandler` and uses a `ProcessedEventStore`
//! to ensure each event is processed at most once per handler.
//!
//! ## Usage
//!
//! ```ignore
//! let handler = IdempotentHandler::new(
//!     DocumentDispatchHandler::new(documents),
//!     processed_event_store.clone(),
//! );
//!
//! event_bus.subscribe_all(&[CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED], Arc::new(handler));
//! ```
//!
//! ## Error Handling
//!
//! - If the inner handler fails, the event is NOT marked as processed,
//!   so the next outbox delivery retries it
//! - ProcessedEventStore errors are propagated to the caller

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, ProcessedEventStore};

/// Decorates an `EventHandler` with idempotency tracking.
///
/// Uses the handler's `name()` as the idempotency key, so two handlers
/// subscribed to the same event each process it once.
pub struct IdempotentHandler<H: EventHandler> {
    inner: H,
    processed_events: Arc<dyn ProcessedEventStore>,
}

impl<H: EventHandler> IdempotentHandler<H> {
    pub fn new(inner: H, processed_events: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            inner,
            processed_events,
        }
    }
}

#[async_trait]
impl<H: EventHandler + 'static> EventHandler for IdempotentHandler<H> {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let handler_name = self.inner.name();

        if self
            .processed_events
            .contains(&envelope.event_id, handler_name)
            .await?
        {
            tracing::debug!(
                event_id = %envelope.event_id,
                handler = handler_name,
                "Skipping already processed event"
            );
            return Ok(());
        }

        let event_id = envelope.event_id.clone();
        self.inner.handle(envelope).await?;

        self.processed_events
            .mark_processed(&event_id, handler_name)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
