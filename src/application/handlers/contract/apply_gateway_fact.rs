//! GatewayFactApplier - shared write path for webhooks and the sweeper.
//!
//! Both ingestion paths translate gateway state into a `GatewayFact` and
//! hand it here, so they run the same idempotent transition and the same
//! revenue uniqueness guard. Gateway calls a fact implies, such as the
//! end-of-term cancellation, are queued as outbox events in the same
//! commit and carried out by `TermEndScheduler`.

use std::sync::Arc;

use super::commit::{commit_with_retry, Committed, Staged};
use crate::domain::contract::{Contract, ContractError, GatewayFact};
use crate::domain::foundation::{ContractId, Timestamp};
use crate::ports::ContractRepository;

/// Result of applying a gateway fact.
#[derive(Debug, Clone)]
pub enum FactApplication {
    /// Contract changed or revenue was recorded.
    Applied(Contract),
    /// Fact already reflected (or not applicable); nothing written.
    Unchanged(Contract),
}

impl FactApplication {
    pub fn contract(&self) -> &Contract {
        match self {
            FactApplication::Applied(c) | FactApplication::Unchanged(c) => c,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, FactApplication::Applied(_))
    }
}

pub struct GatewayFactApplier {
    contracts: Arc<dyn ContractRepository>,
}

impl GatewayFactApplier {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    pub async fn apply(
        &self,
        contract_id: ContractId,
        fact: &GatewayFact,
    ) -> Result<FactApplication, ContractError> {
        let (committed, ()) =
            commit_with_retry(self.contracts.as_ref(), contract_id, |contract| {
                let outcome = contract.apply_gateway_fact(fact, Timestamp::now());
                if outcome.is_noop() {
                    return Ok((None, ()));
                }
                Ok((
                    Some(Staged {
                        events: outcome.events,
                        revenue: outcome.revenue,
                    }),
                    (),
                ))
            })
            .await?;

        match committed {
            Committed::Applied(contract) => {
                tracing::info!(
                    contract_id = %contract.id,
                    status = %contract.status,
                    fact = fact.name(),
                    "Applied gateway fact"
                );
                Ok(FactApplication::Applied(contract))
            }
            Committed::Unchanged(contract) | Committed::DuplicateRevenue(contract) => {
                tracing::debug!(
                    contract_id = %contract.id,
                    fact = fact.name(),
                    "Gateway fact already reflected"
                );
                Ok(FactApplication::Unchanged(contract))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::{
        ContractEvent, ContractEventKind, ContractStatus, CONTRACT_PAYMENT_CONFIRMED,
        CONTRACT_TERM_END_REQUESTED, LICENSE_TERM_YEARS,
    };

    use super::super::test_support::{contract_in, metered_contract_in, seeded_store};

    fn invoice_paid(invoice_id: &str) -> GatewayFact {
        GatewayFact::InvoicePaid {
            invoice_id: invoice_id.to_string(),
            amount_minor: 117,
            currency: "usd".to_string(),
            subscription_id: "sub_seed".to_string(),
            customer_id: Some("cus_seed".to_string()),
        }
    }

    fn recurring_completed() -> GatewayFact {
        GatewayFact::CheckoutCompletedRecurring {
            session_id: "cs_1".to_string(),
            subscription_id: "sub_1".to_string(),
            customer_id: Some("cus_1".to_string()),
        }
    }

    #[tokio::test]
    async fn recurring_checkout_activates_and_queues_term_end() {
        let mut contract = metered_contract_in(ContractStatus::PendingPayment);
        contract.session_id = Some("cs_1".to_string());
        let created_at = contract.created_at;
        let (store, id) = seeded_store(contract);
        let applier = GatewayFactApplier::new(store.clone());

        let result = applier.apply(id, &recurring_completed()).await.unwrap();

        assert!(result.is_applied());
        let stored = store.contract(&id).unwrap();
        assert_eq!(stored.status, ContractStatus::Active);
        assert_eq!(stored.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(
            store.outbox_event_types(&id),
            vec![CONTRACT_PAYMENT_CONFIRMED, CONTRACT_TERM_END_REQUESTED]
        );

        let queued = store
            .outbox_entries()
            .into_iter()
            .find(|e| e.event.event_type == CONTRACT_TERM_END_REQUESTED)
            .unwrap();
        let event: ContractEvent = queued.event.payload_as().unwrap();
        assert_eq!(
            event.kind,
            ContractEventKind::TermEndRequested {
                subscription_id: "sub_1".to_string(),
                cancel_at: created_at.add_years(LICENSE_TERM_YEARS),
            }
        );
    }

    #[tokio::test]
    async fn replayed_fact_is_unchanged_and_queues_term_end_once() {
        let contract = metered_contract_in(ContractStatus::PendingPayment);
        let (store, id) = seeded_store(contract);
        let applier = GatewayFactApplier::new(store.clone());

        applier.apply(id, &recurring_completed()).await.unwrap();
        let second = applier.apply(id, &recurring_completed()).await.unwrap();

        assert!(!second.is_applied());
        let queued = store
            .outbox_event_types(&id)
            .into_iter()
            .filter(|t| t == CONTRACT_TERM_END_REQUESTED)
            .count();
        assert_eq!(queued, 1);
        assert_eq!(store.contract(&id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn duplicate_invoice_records_revenue_once() {
        let contract = metered_contract_in(ContractStatus::Active);
        let (store, id) = seeded_store(contract);
        let applier = GatewayFactApplier::new(store.clone());

        let first = applier.apply(id, &invoice_paid("in_1")).await.unwrap();
        let second = applier.apply(id, &invoice_paid("in_1")).await.unwrap();
        applier.apply(id, &invoice_paid("in_2")).await.unwrap();

        assert!(first.is_applied());
        assert!(!second.is_applied());
        let external_ids: Vec<_> = store
            .revenue_for(&id)
            .into_iter()
            .map(|r| r.external_id)
            .collect();
        assert_eq!(external_ids, vec!["in_1", "in_2"]);
    }

    #[tokio::test]
    async fn terminal_contract_absorbs_fact() {
        let contract = contract_in(ContractStatus::Paid);
        let (store, id) = seeded_store(contract);
        let applier = GatewayFactApplier::new(store.clone());

        let result = applier.apply(id, &GatewayFact::SessionExpired).await.unwrap();

        assert!(!result.is_applied());
        assert_eq!(result.contract().status, ContractStatus::Paid);
    }
}
