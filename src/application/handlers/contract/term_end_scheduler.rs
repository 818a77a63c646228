//! TermEndScheduler - Sets the end-of-term cancellation on activated subscriptions.
//!
//! Subscribed to `contract.term_end_requested`. A gateway failure is
//! returned to the outbox publisher, which keeps the entry and delivers it
//! again on the next poll. Setting `cancel_at` is idempotent at the gateway.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::contract::{ContractEvent, ContractEventKind, CONTRACT_TERM_END_REQUESTED};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, PaymentProvider};

/// Event types this handler consumes.
pub const TERM_END_EVENT_TYPES: [&str; 1] = [CONTRACT_TERM_END_REQUESTED];

pub struct TermEndScheduler {
    payment_provider: Arc<dyn PaymentProvider>,
}

impl TermEndScheduler {
    pub fn new(payment_provider: Arc<dyn PaymentProvider>) -> Self {
        Self { payment_provider }
    }
}

#[async_trait]
impl EventHandler for TermEndScheduler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if event.event_type != CONTRACT_TERM_END_REQUESTED {
            return Ok(());
        }
        let decoded: ContractEvent = event.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Undecodable term end payload: {}", e),
            )
        })?;
        let ContractEventKind::TermEndRequested {
            subscription_id,
            cancel_at,
        } = decoded.kind
        else {
            tracing::warn!(
                event_id = %event.event_id,
                "Term end event without a term end payload"
            );
            return Ok(());
        };

        self.payment_provider
            .schedule_subscription_cancellation(&subscription_id, cancel_at)
            .await
            .map_err(|e| {
                tracing::warn!(
                    contract_id = %decoded.contract_id,
                    subscription_id = %subscription_id,
                    error = %e,
                    "Scheduling subscription cancellation failed; outbox will retry"
                );
                DomainError::new(ErrorCode::PaymentProviderError, e.to_string())
            })?;

        tracing::info!(
            contract_id = %decoded.contract_id,
            subscription_id = %subscription_id,
            cancel_at = %cancel_at,
            "Scheduled subscription end of term"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TermEndScheduler"
    }
}
