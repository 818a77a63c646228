//! DeleteContractHandler - Administrative removal of unsettled contracts.

use std::sync::Arc;

use super::checkout_teardown::CheckoutTeardown;
use super::commit::delete_with_retry;
use crate::domain::contract::{Contract, ContractError, ContractStatus};
use crate::domain::foundation::ContractId;
use crate::ports::{ContractRepository, PaymentProvider};

#[derive(Debug, Clone)]
pub struct DeleteContractCommand {
    pub contract_id: ContractId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteContractResult {
    Deleted(ContractId),
    /// Nothing stored under that id.
    AlreadyGone(ContractId),
}

/// Handler for admin deletes.
///
/// Payment-confirmed contracts and cancelled subscriptions carry revenue
/// history and are never deleted.
pub struct DeleteContractHandler {
    contracts: Arc<dyn ContractRepository>,
    teardown: CheckoutTeardown,
}

impl DeleteContractHandler {
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
        cmd: DeleteContractCommand,
    ) -> Result<DeleteContractResult, ContractError> {
        let Some(contract) = self.contracts.find_by_id(&cmd.contract_id).await? else {
            return Ok(DeleteContractResult::AlreadyGone(cmd.contract_id));
        };
        ensure_deletable(&contract)?;

        let deleted = match (contract.status, contract.session_id.clone()) {
            (ContractStatus::PendingPayment, Some(session_id)) => {
                self.teardown
                    .remove(&contract, &session_id, ensure_deletable)
                    .await?
            }
            _ => delete_with_retry(self.contracts.as_ref(), contract.id, ensure_deletable).await?,
        };

        match deleted {
            Some(deleted) => {
                tracing::info!(
                    contract_id = %deleted.id,
                    status = %deleted.status,
                    "Contract deleted by admin"
                );
                Ok(DeleteContractResult::Deleted(deleted.id))
            }
            None => Ok(DeleteContractResult::AlreadyGone(cmd.contract_id)),
        }
    }
}

fn ensure_deletable(contract: &Contract) -> Result<(), ContractError> {
    let settled = contract.status.is_payment_confirmed()
        || (contract.status == ContractStatus::Cancelled && contract.subscription_id.is_some());
    if settled {
        Err(ContractError::already_settled(contract.id, contract.status))
    } else {
        Ok(())
    }
}
