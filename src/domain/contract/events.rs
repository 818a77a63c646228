//! Contract domain events.
//!
//! Written to the outbox in the same transaction as the state change they
//! describe. Named in past tense.

use crate::domain::foundation::{ContractId, DomainEvent, EventId, Timestamp, UserId, VideoId};
use serde::{Deserialize, Serialize};

use super::ContractStatus;
use crate::domain::pricing::PricingModel;

/// Event type emitted when the licensor accepts a contract.
pub const CONTRACT_ACCEPTED: &str = "contract.accepted.v1";

/// Event type emitted when the first payment is confirmed.
pub const CONTRACT_PAYMENT_CONFIRMED: &str = "contract.payment_confirmed.v1";

/// Event type emitted when a subscription needs its end of term set at the gateway.
pub const CONTRACT_TERM_END_REQUESTED: &str = "contract.term_end_requested.v1";

/// What happened to the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractEventKind {
    Created {
        licensor_id: UserId,
        licensee_id: UserId,
        pricing_model: PricingModel,
        price_value: f64,
        status: ContractStatus,
    },

    /// State transition: PendingReview -> PendingPayment
    Accepted { licensor_id: UserId },

    /// State transition: PendingReview -> Rejected
    Rejected { licensor_id: UserId },

    /// State transition: PendingReview | PendingPayment -> Withdrawn
    Withdrawn { licensee_id: UserId },

    ReactionVideoAttached { reaction_video_id: VideoId },

    CheckoutStarted { session_id: String },

    /// State transition: PendingPayment -> Paid | Active
    PaymentConfirmed {
        status: ContractStatus,
        subscription_id: Option<String>,
    },

    /// State transition: Active -> PaymentFailed
    PaymentFailed { invoice_id: Option<String> },

    /// State transition: PaymentFailed -> Active
    PaymentRecovered { invoice_id: Option<String> },

    /// State transition: * -> Cancelled
    Cancelled { reason: String },

    UsageReported { delta: i64, total: i64 },

    /// The subscription must be cancelled at the close of the license term.
    TermEndRequested {
        subscription_id: String,
        cancel_at: Timestamp,
    },
}

/// Envelope-ready domain event for a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractEvent {
    pub event_id: EventId,
    pub contract_id: ContractId,
    pub occurred_at: Timestamp,
    #[serde(flatten)]
    pub kind: ContractEventKind,
}

impl ContractEvent {
    pub fn new(contract_id: ContractId, occurred_at: Timestamp, kind: ContractEventKind) -> Self {
        Self {
            event_id: EventId::new(),
            contract_id,
            occurred_at,
            kind,
        }
    }
}

impl DomainEvent for ContractEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            ContractEventKind::Created { .. } => "contract.created.v1",
            ContractEventKind::Accepted { .. } => CONTRACT_ACCEPTED,
            ContractEventKind::Rejected { .. } => "contract.rejected.v1",
            ContractEventKind::Withdrawn { .. } => "contract.withdrawn.v1",
            ContractEventKind::ReactionVideoAttached { .. } => "contract.reaction_video_attached.v1",
            ContractEventKind::CheckoutStarted { .. } => "contract.checkout_started.v1",
            ContractEventKind::PaymentConfirmed { .. } => CONTRACT_PAYMENT_CONFIRMED,
            ContractEventKind::PaymentFailed { .. } => "contract.payment_failed.v1",
            ContractEventKind::PaymentRecovered { .. } => "contract.payment_recovered.v1",
            ContractEventKind::Cancelled { .. } => "contract.cancelled.v1",
            ContractEventKind::UsageReported { .. } => "contract.usage_reported.v1",
            ContractEventKind::TermEndRequested { .. } => CONTRACT_TERM_END_REQUESTED,
        }
    }

    fn aggregate_id(&self) -> String {
        self.contract_id.to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        "Contract"
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn event_id(&self) -> EventId {
        self.event_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SerializableDomainEvent;

    #[test]
    fn envelope_carries_type_and_flattened_payload() {
        let id = ContractId::new();
        let event = ContractEvent::new(
            id,
            Timestamp::now(),
            ContractEventKind::PaymentConfirmed {
                status: ContractStatus::Active,
                subscription_id: Some("sub_1".to_string()),
            },
        );

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, CONTRACT_PAYMENT_CONFIRMED);
        assert_eq!(envelope.aggregate_type, "Contract");
        assert_eq!(envelope.aggregate_id, id.to_string());
        assert_eq!(envelope.payload["kind"], "payment_confirmed");
        assert_eq!(envelope.payload["status"], "ACTIVE");
        assert_eq!(envelope.payload["contract_id"], id.to_string());
    }

    #[test]
    fn payload_deserializes_back() {
        let event = ContractEvent::new(
            ContractId::new(),
            Timestamp::now(),
            ContractEventKind::Accepted {
                licensor_id: UserId::new("licensor-1").unwrap(),
            },
        );
        let envelope = event.to_envelope().unwrap();
        let decoded: ContractEvent = envelope.payload_as().unwrap();
        assert_eq!(decoded, event);
    }
}
