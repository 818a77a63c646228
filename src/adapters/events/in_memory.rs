//! Same-process fan-out for outbox deliveries.
//!
//! The outbox publisher hands each pending entry to this bus, which runs
//! every handler subscribed to the event type. A handler error fails the
//! delivery and leaves the outbox entry for the next poll.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

type Subscriptions = HashMap<String, Vec<Arc<dyn EventHandler>>>;

/// Routes contract events to their side-effect handlers.
///
/// Delivery is sequential on the caller's task. The bus keeps a log of
/// everything it has seen so integration tests can assert on it.
pub struct InMemoryEventBus {
    handlers: RwLock<Subscriptions>,
    delivered: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            delivered: RwLock::new(Vec::new()),
        }
    }

    fn log(&self) -> RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.delivered
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every delivered event in arrival order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.log().clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.log()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.log().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.log().iter().any(|e| e.event_type == event_type)
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.delivered
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());

        let mut failed = Vec::new();
        for handler in self.handlers_for(&event.event_type) {
            if let Err(e) = handler.handle(event.clone()).await {
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    contract_id = %event.aggregate_id,
                    handler = handler.name(),
                    error = %e,
                    "Side-effect handler failed"
                );
                failed.push(format!("{}: {}", handler.name(), e));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::InternalError,
                format!("{} handler(s) failed: {}", failed.len(), failed.join("; ")),
            ))
        }
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}
