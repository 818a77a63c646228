//! Removal of contracts whose checkout never completed.
//!
//! A contract with an unpaid session was never binding, so it is deleted
//! rather than marked. The session must be dead first: once expired it can
//! no longer be paid. If the gateway refuses to expire it because payment
//! already went through, that payment is applied and the removal refused.

use std::sync::Arc;

use super::apply_gateway_fact::GatewayFactApplier;
use super::commit::delete_with_retry;
use super::session_facts::fact_from_session;
use crate::domain::contract::{Contract, ContractError};
use crate::ports::{CheckoutSessionStatus, ContractRepository, PaymentProvider};

pub(crate) struct CheckoutTeardown {
    contracts: Arc<dyn ContractRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    applier: GatewayFactApplier,
}

impl CheckoutTeardown {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let applier = GatewayFactApplier::new(contracts.clone());
        Self {
            contracts,
            payment_provider,
            applier,
        }
    }

    /// Kills `session_id` and deletes the contract if `check` still accepts it.
    ///
    /// Returns the deleted contract, or `None` if it was already gone.
    pub async fn remove<F>(
        &self,
        contract: &Contract,
        session_id: &str,
        check: F,
    ) -> Result<Option<Contract>, ContractError>
    where
        F: Fn(&Contract) -> Result<(), ContractError> + Send + Sync,
    {
        if let Err(expire_err) = self
            .payment_provider
            .expire_checkout_session(session_id)
            .await
        {
            tracing::debug!(
                contract_id = %contract.id,
                session_id,
                error = %expire_err,
                "Session could not be expired, checking its state"
            );
            let session = self
                .payment_provider
                .retrieve_checkout_session(session_id)
                .await?;
            match session.status {
                CheckoutSessionStatus::Expired => {}
                CheckoutSessionStatus::Open => return Err(expire_err.into()),
                CheckoutSessionStatus::Complete => {
                    return Err(self.settle_completed(contract, &session).await);
                }
            }
        }

        let deleted = delete_with_retry(self.contracts.as_ref(), contract.id, check).await?;
        if let Some(deleted) = &deleted {
            tracing::info!(
                contract_id = %deleted.id,
                session_id,
                "Contract with abandoned checkout deleted"
            );
        }
        Ok(deleted)
    }

    /// Applies a completed session and returns the error explaining why the
    /// removal did not happen.
    async fn settle_completed(
        &self,
        contract: &Contract,
        session: &crate::ports::CheckoutSessionDetails,
    ) -> ContractError {
        let Some(fact) = fact_from_session(contract, session) else {
            return ContractError::payment_provider(
                "checkout completed and payment is still processing",
                true,
            );
        };
        match self.applier.apply(contract.id, &fact).await {
            Ok(applied) => {
                let current = applied.contract();
                tracing::info!(
                    contract_id = %current.id,
                    status = %current.status,
                    "Checkout completed before it could be abandoned"
                );
                ContractError::already_settled(current.id, current.status)
            }
            Err(e) => e,
        }
    }
}
