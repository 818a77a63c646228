//! AcceptContractHandler - Licensor accepts a pending licence request.

use std::sync::Arc;

use super::commit::{commit_with_retry, ContractUpdate, Staged};
use crate::domain::contract::{ContractError, Party};
use crate::domain::foundation::{ContractId, Timestamp, UserId};
use crate::ports::ContractRepository;

#[derive(Debug, Clone)]
pub struct AcceptContractCommand {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

/// Handler for licensor acceptance.
///
/// The accepted event lands in the outbox with the state change; the
/// licence document request is dispatched from there.
pub struct AcceptContractHandler {
    contracts: Arc<dyn ContractRepository>,
}

impl AcceptContractHandler {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    pub async fn handle(&self, cmd: AcceptContractCommand) -> Result<ContractUpdate, ContractError> {
        let (committed, _) =
            commit_with_retry(self.contracts.as_ref(), cmd.contract_id, |contract| {
                contract.check_party(&cmd.requested_by, Party::Licensor, "accept")?;
                Ok((Staged::from_transition(contract.accept(Timestamp::now())?), ()))
            })
            .await?;

        if committed.is_applied() {
            tracing::info!(contract_id = %cmd.contract_id, "Contract accepted by licensor");
        }
        Ok(committed.into())
    }
}
