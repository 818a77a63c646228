//! Contract status state machine.
//!
//! FIXED contracts end in `Paid`. METERED contracts cycle between
//! `Active` and `PaymentFailed` until the subscription is cancelled.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a licensing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Awaiting the licensor's decision.
    PendingReview,

    /// Accepted by both parties, awaiting checkout.
    PendingPayment,

    /// One-time payment completed.
    Paid,

    /// Subscription in good standing.
    Active,

    /// Latest subscription invoice failed; gateway retries continue.
    PaymentFailed,

    Cancelled,
    Rejected,
    Withdrawn,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 8] = [
        ContractStatus::PendingReview,
        ContractStatus::PendingPayment,
        ContractStatus::Paid,
        ContractStatus::Active,
        ContractStatus::PaymentFailed,
        ContractStatus::Cancelled,
        ContractStatus::Rejected,
        ContractStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::PendingReview => "PENDING_REVIEW",
            ContractStatus::PendingPayment => "PENDING_PAYMENT",
            ContractStatus::Paid => "PAID",
            ContractStatus::Active => "ACTIVE",
            ContractStatus::PaymentFailed => "PAYMENT_FAILED",
            ContractStatus::Cancelled => "CANCELLED",
            ContractStatus::Rejected => "REJECTED",
            ContractStatus::Withdrawn => "WITHDRAWN",
        }
    }

    /// True once the gateway has confirmed at least one payment.
    pub fn is_payment_confirmed(&self) -> bool {
        matches!(
            self,
            ContractStatus::Paid | ContractStatus::Active | ContractStatus::PaymentFailed
        )
    }

    /// True if the gateway can still move a contract in this status.
    pub fn is_reconcilable(&self) -> bool {
        matches!(
            self,
            ContractStatus::PendingPayment | ContractStatus::Active | ContractStatus::PaymentFailed
        )
    }

    /// True if a contract in this status prevents a new request for the
    /// same licensee / original / reaction triple.
    ///
    /// Rejected and paid triples stay blocked permanently.
    pub fn blocks_new_request(&self) -> bool {
        !self.is_terminal() || matches!(self, ContractStatus::Rejected | ContractStatus::Paid)
    }
}

impl StateMachine for ContractStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use ContractStatus::*;
        match self {
            PendingReview => vec![PendingPayment, Rejected, Withdrawn],
            PendingPayment => vec![Paid, Active, PaymentFailed, Cancelled, Withdrawn],
            Active => vec![PaymentFailed, Cancelled],
            PaymentFailed => vec![Active, Cancelled],
            Paid | Cancelled | Rejected | Withdrawn => vec![],
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("status", format!("unknown contract status '{}'", s))
            })
    }
}
