//! RejectContractHandler - Licensor declines a licence request.

use std::sync::Arc;

use super::commit::{commit_with_retry, ContractUpdate, Staged};
use crate::domain::contract::{ContractError, Party};
use crate::domain::foundation::{ContractId, Timestamp, UserId};
use crate::ports::ContractRepository;

#[derive(Debug, Clone)]
pub struct RejectContractCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

/// Handler for licensor rejection. A rejected contract keeps blocking its
/// licensee / original / reaction triple.
pub struct RejectContractHandler {
    contracts: Arc<dyn ContractRepository>,
}

impl RejectContractHandler {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    pub async fn handle(&self, cmd: RejectContractCommand) -> Result<ContractUpdate, ContractError> {
        let (committed, _) =
            commit_with_retry(self.contracts.as_ref(), cmd.contract_id, |contract| {
                contract.check_party(&cmd.requested_by, Party::Licensor, "reject")?;
                Ok((Staged::from_transition(contract.reject(Timestamp::now())?), ()))
            })
            .await?;

        if committed.is_applied() {
            tracing::info!(contract_id = %cmd.contract_id, "Contract rejected by licensor");
        }
        Ok(committed.into())
    }
}
