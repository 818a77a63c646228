//! Party checks for caller-facing operations.
//!
//! A contract has two parties. Review actions belong to the licensor,
//! payment actions to the licensee, and reads to either.

use crate::domain::foundation::UserId;

use super::{Contract, ContractError};

/// Which side of the contract an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Licensor,
    Licensee,
    Either,
}

impl Party {
    fn describe(self) -> &'static str {
        match self {
            Party::Licensor => "only the licensor",
            Party::Licensee => "only the licensee",
            Party::Either => "only a party to the contract",
        }
    }
}

impl Contract {
    pub fn is_party(&self, user_id: &UserId) -> bool {
        self.licensor_id == *user_id || self.licensee_id == *user_id
    }

    /// Fails with `Forbidden` unless `user_id` is the required party.
    pub fn check_party(
        &self,
        user_id: &UserId,
        party: Party,
        action: &str,
    ) -> Result<(), ContractError> {
        let allowed = match party {
            Party::Licensor => self.licensor_id == *user_id,
            Party::Licensee => self.licensee_id == *user_id,
            Party::Either => self.is_party(user_id),
        };
        if allowed {
            Ok(())
        } else {
            tracing::warn!(
                contract_id = %self.id,
                user_id = %user_id,
                action,
                "Contract access denied"
            );
            Err(ContractError::forbidden(format!(
                "{} may {} this contract",
                party.describe(),
                action
            )))
        }
    }
}
