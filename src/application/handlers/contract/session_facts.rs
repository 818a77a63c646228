//! Gateway facts derived from retrieved checkout sessions.

use crate::domain::contract::{Contract, GatewayFact};
use crate::ports::{CheckoutSessionDetails, CheckoutSessionStatus};

/// What a retrieved session says about its contract. `None` while the session is open
/// or completed without settled payment.
pub(crate) fn fact_from_session(
    contract: &Contract,
    session: &CheckoutSessionDetails,
) -> Option<GatewayFact> {
    match session.status {
        CheckoutSessionStatus::Open => None,
        CheckoutSessionStatus::Expired => Some(GatewayFact::SessionExpired),
        CheckoutSessionStatus::Complete => match &session.subscription_id {
            Some(subscription_id) => Some(GatewayFact::CheckoutCompletedRecurring {
                session_id: session.id.clone(),
                subscription_id: subscription_id.clone(),
                customer_id: session.customer_id.clone(),
            }),
            None if session.is_paid() => Some(GatewayFact::CheckoutCompletedOneTime {
                session_id: session.id.clone(),
                amount_minor: session
                    .amount_total
                    .unwrap_or_else(|| contract.price_value.to_minor_units()),
                currency: session
                    .currency
                    .clone()
                    .unwrap_or_else(|| contract.currency.clone()),
            }),
            None => None,
        },
    }
}
