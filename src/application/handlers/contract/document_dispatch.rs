//! DocumentDispatchHandler - Requests licence documents from outbox events.
//!
//! Subscribed to `contract.accepted` and `contract.payment_confirmed`.
//! Document generation is best-effort: a failed request is logged and
//! the event still counts as handled.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::contract::{CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED};
use crate::domain::foundation::{ContractId, DomainError, EventEnvelope};
use crate::ports::{DocumentGenerator, DocumentRequest, DocumentTrigger, EventHandler};

/// Event types this handler consumes.
pub const DOCUMENT_EVENT_TYPES: [&str; 2] = [CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED];

pub struct DocumentDispatchHandler {
    documents: Arc<dyn DocumentGenerator>,
}

impl DocumentDispatchHandler {
    pub fn new(documents: Arc<dyn DocumentGenerator>) -> Self {
        Self { documents }
    }

    fn trigger_for(event_type: &str) -> Option<DocumentTrigger> {
        match event_type {
            CONTRACT_ACCEPTED => Some(DocumentTrigger::LicensorAccepted),
            CONTRACT_PAYMENT_CONFIRMED => Some(DocumentTrigger::PaymentConfirmed),
            _ => None,
        }
    }
}

#[async_trait]
impl EventHandler for DocumentDispatchHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let Some(trigger) = Self::trigger_for(&event.event_type) else {
            return Ok(());
        };
        let contract_id: ContractId = match event.aggregate_id.parse() {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    aggregate_id = %event.aggregate_id,
                    "Document event with unparseable contract id"
                );
                return Ok(());
            }
        };

        match self
            .documents
            .request_generation(DocumentRequest {
                contract_id,
                trigger,
            })
            .await
        {
            Ok(()) => {
                tracing::debug!(contract_id = %contract_id, ?trigger, "Document requested");
            }
            Err(e) => {
                tracing::error!(
                    contract_id = %contract_id,
                    event_id = %event.event_id,
                    ?trigger,
                    error = %e,
                    "Document generation request failed"
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DocumentDispatch"
    }
}
