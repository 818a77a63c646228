//! GetContractHandler - Query handler for a single contract.

use std::sync::Arc;

use crate::domain::contract::{Contract, ContractError, Party};
use crate::domain::foundation::{ContractId, UserId};
use crate::ports::ContractRepository;

#[derive(Debug, Clone)]
pub struct GetContractQuery {
    pub contract_id: ContractId,
    pub requested_by: UserId,
}

/// Returns a contract to either of its parties.
pub struct GetContractHandler {
    contracts: Arc<dyn ContractRepository>,
}

impl GetContractHandler {
    pub fn new(contracts: Arc<dyn ContractRepository>) -> Self {
        Self { contracts }
    }

    pub async fn handle(&self, query: GetContractQuery) -> Result<Contract, ContractError> {
        let contract = self
            .contracts
            .find_by_id(&query.contract_id)
            .await?
            .ok_or(ContractError::NotFound(query.contract_id))?;
        contract.check_party(&query.requested_by, Party::Either, "view")?;
        Ok(contract)
    }
}
