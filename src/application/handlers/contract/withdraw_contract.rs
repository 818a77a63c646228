//! WithdrawContractHandler - Licensee withdraws before paying.

use std::sync::Arc;

use super::checkout_teardown::CheckoutTeardown;
use super::commit::{commit_with_retry, ContractUpdate, Staged};
use crate::domain::contract::{ContractError, ContractStatus, Party};
use crate::domain::foundation::{ContractId, Timestamp, UserId};
use crate::ports::{ContractRepository, PaymentProvider};

#[derive(Debug, Clone)]
pub struct WithdrawContractCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub enum WithdrawContractResult {
    /// Contract kept as `WITHDRAWN`.
    Withdrawn(ContractUpdate),
    /// A checkout session existed; the contract was deleted with it.
    Deleted(ContractId),
}

/// Handler for licensee withdrawal.
///
/// Fails with `ALREADY_SETTLED` once payment has been confirmed.
pub struct WithdrawContractHandler {
    contracts: Arc<dyn ContractRepository>,
    teardown: CheckoutTeardown,
}

impl WithdrawContractHandler {
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
        cmd: WithdrawContractCommand,
    ) -> Result<WithdrawContractResult, ContractError> {
        let contract = self
            .contracts
            .find_by_id(&cmd.contract_id)
            .await?
            .ok_or(ContractError::NotFound(cmd.contract_id))?;
        contract.check_party(&cmd.requested_by, Party::Licensee, "withdraw")?;

        if let (ContractStatus::PendingPayment, Some(session_id)) =
            (contract.status, contract.session_id.clone())
        {
            self.teardown
                .remove(&contract, &session_id, |current| match current.status {
                    ContractStatus::PendingReview | ContractStatus::PendingPayment => Ok(()),
                    status if status.is_payment_confirmed() => {
                        Err(ContractError::already_settled(current.id, status))
                    }
                    status => Err(ContractError::invalid_state(status, "withdraw")),
                })
                .await?;
            tracing::info!(contract_id = %contract.id, "Contract withdrawn during checkout");
            return Ok(WithdrawContractResult::Deleted(contract.id));
        }

        let (committed, _) =
            commit_with_retry(self.contracts.as_ref(), cmd.contract_id, |contract| {
                Ok((Staged::from_transition(contract.withdraw(Timestamp::now())?), ()))
            })
            .await?;

        if committed.is_applied() {
            tracing::info!(contract_id = %cmd.contract_id, "Contract withdrawn by licensee");
        }
        Ok(WithdrawContractResult::Withdrawn(committed.into()))
    }
}
