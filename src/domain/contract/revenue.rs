//! Revenue bookkeeping records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ContractId, Timestamp};

/// Source of a revenue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueKind {
    OneTimePayment,
    SubscriptionInvoice,
}

impl RevenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueKind::OneTimePayment => "one_time_payment",
            RevenueKind::SubscriptionInvoice => "subscription_invoice",
        }
    }
}

impl fmt::Display for RevenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded payment.
///
/// `external_id` is the gateway's own identifier (checkout session for
/// one-time payments, invoice for subscriptions). Stores must keep it unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueEvent {
    pub external_id: String,
    pub contract_id: ContractId,
    pub amount_minor: i64,
    pub currency: String,
    pub kind: RevenueKind,
    pub occurred_at: Timestamp,
}
