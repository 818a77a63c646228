//! AbandonCheckoutHandler - Licensee cancels mid-checkout.

use std::sync::Arc;

use super::checkout_teardown::CheckoutTeardown;
use crate::domain::contract::{ContractError, ContractStatus, Party};
use crate::domain::foundation::{ContractId, UserId};
use crate::ports::{ContractRepository, PaymentProvider};

#[derive(Debug, Clone)]
pub struct AbandonCheckoutCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonCheckoutResult {
    pub contract_id: ContractId,
}

/// Handler for abandoning an unpaid checkout.
///
/// The session is expired and the contract deleted, freeing the triple for
/// a fresh request.
pub struct AbandonCheckoutHandler {
    contracts: Arc<dyn ContractRepository>,
    teardown: CheckoutTeardown,
}

impl AbandonCheckoutHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let teardown = CheckoutTeardown::new(contracts.clone(), payment_provider);
        Self {
            contracts,
            teardown,
        }
    }

    pub async fn handle(
        &self,
        cmd: AbandonCheckoutCommand,
    ) -> Result<AbandonCheckoutResult, ContractError> {
        let contract = self
            .contracts
            .find_by_id(&cmd.contract_id)
            .await?
            .ok_or(ContractError::NotFound(cmd.contract_id))?;
        contract.check_party(&cmd.requested_by, Party::Licensee, "cancel checkout for")?;

        if contract.status.is_payment_confirmed() {
            return Err(ContractError::already_settled(contract.id, contract.status));
        }
        let session_id = match (contract.status, contract.session_id.clone()) {
            (ContractStatus::PendingPayment, Some(session_id)) => session_id,
            (status, _) => return Err(ContractError::invalid_state(status, "cancel checkout for")),
        };

        self.teardown
            .remove(&contract, &session_id, |current| {
                if current.status == ContractStatus::PendingPayment
                    && current.session_id.as_deref() == Some(session_id.as_str())
                {
                    Ok(())
                } else if current.status.is_payment_confirmed() {
                    Err(ContractError::already_settled(current.id, current.status))
                } else {
                    Err(ContractError::invalid_state(current.status, "cancel checkout for"))
                }
            })
            .await?;

        Ok(AbandonCheckoutResult {
            contract_id: contract.id,
        })
    }
}
