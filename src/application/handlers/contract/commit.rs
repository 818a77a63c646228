//! Optimistic read-modify-write over the contract store.
//!
//! Every contract mutation goes through `commit_with_retry`: load, apply
//! the domain transition, commit against the loaded version. A version
//! conflict reloads and re-applies, so a concurrent webhook and caller
//! action serialize instead of overwriting each other.

use crate::domain::contract::{Contract, ContractError, ContractEvent, RevenueEvent, Transition};
use crate::domain::foundation::ContractId;
use crate::ports::{CommitOutcome, ContractChange, ContractRepository};

/// Attempts before giving up with `ConcurrentModification`.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// What a mutation wants persisted.
#[derive(Debug, Clone, Default)]
pub(crate) struct Staged {
    pub events: Vec<ContractEvent>,
    pub revenue: Option<RevenueEvent>,
}

impl Staged {
    /// `None` for `Transition::Unchanged`.
    pub fn from_transition(transition: Transition) -> Option<Self> {
        match transition {
            Transition::Applied(events) => Some(Self {
                events,
                revenue: None,
            }),
            Transition::Unchanged => None,
        }
    }
}

/// How a mutation ended.
#[derive(Debug, Clone)]
pub(crate) enum Committed {
    /// Change persisted; holds the new state.
    Applied(Contract),
    /// Nothing to persist; holds the current state.
    Unchanged(Contract),
    /// The revenue row already existed and the change was discarded; holds the stored state.
    DuplicateRevenue(Contract),
}

impl Committed {
    pub fn contract(&self) -> &Contract {
        match self {
            Committed::Applied(c) | Committed::Unchanged(c) | Committed::DuplicateRevenue(c) => c,
        }
    }

    pub fn into_contract(self) -> Contract {
        match self {
            Committed::Applied(c) | Committed::Unchanged(c) | Committed::DuplicateRevenue(c) => c,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Committed::Applied(_))
    }
}

/// Contract state after a caller-facing operation.
#[derive(Debug, Clone)]
pub struct ContractUpdate {
    pub contract: Contract,
    /// False when the operation replayed one that already took effect.
    pub changed: bool,
}

impl From<Committed> for ContractUpdate {
    fn from(committed: Committed) -> Self {
        let changed = committed.is_applied();
        Self {
            contract: committed.into_contract(),
            changed,
        }
    }
}

/// Loads `id`, applies `mutate`, and commits under optimistic locking.
///
/// `mutate` may run several times and must derive everything from the
/// contract it is given. Returning `None` as the staged change commits
/// nothing. The second tuple element is passed through from the last run.
pub(crate) async fn commit_with_retry<T, F>(
    contracts: &dyn ContractRepository,
    id: ContractId,
    mut mutate: F,
) -> Result<(Committed, T), ContractError>
where
    F: FnMut(&mut Contract) -> Result<(Option<Staged>, T), ContractError> + Send,
    T: Send,
{
    for attempt in 1..=MAX_COMMIT_ATTEMPTS {
        let stored = contracts
            .find_by_id(&id)
            .await?
            .ok_or(ContractError::NotFound(id))?;
        let expected_version = stored.version;

        let mut contract = stored.clone();
        let (staged, output) = mutate(&mut contract)?;
        let Some(staged) = staged else {
            return Ok((Committed::Unchanged(contract), output));
        };
        contract.version = expected_version + 1;

        let change = ContractChange {
            contract: contract.clone(),
            expected_version,
            revenue: staged.revenue,
            events: staged.events,
        };
        match contracts.commit(change).await? {
            CommitOutcome::Committed => return Ok((Committed::Applied(contract), output)),
            CommitOutcome::DuplicateRevenue => {
                tracing::info!(contract_id = %id, "Revenue already recorded; change discarded");
                return Ok((Committed::DuplicateRevenue(stored), output));
            }
            CommitOutcome::VersionConflict => {
                tracing::debug!(
                    contract_id = %id,
                    attempt,
                    expected_version,
                    "Contract version moved on; retrying"
                );
            }
        }
    }

    tracing::warn!(contract_id = %id, "Giving up after repeated version conflicts");
    Err(ContractError::ConcurrentModification(id))
}

/// Applies `mutate` to `loaded` and commits against its version, once.
///
/// For changes whose side effects were already computed from `loaded`: a
/// version conflict surfaces as `ConcurrentModification` rather than being
/// re-applied to newer state.
pub(crate) async fn commit_at_version<F>(
    contracts: &dyn ContractRepository,
    loaded: Contract,
    mutate: F,
) -> Result<Committed, ContractError>
where
    F: FnOnce(&mut Contract) -> Result<Option<Staged>, ContractError>,
{
    let id = loaded.id;
    let expected_version = loaded.version;
    let mut contract = loaded.clone();
    let Some(staged) = mutate(&mut contract)? else {
        return Ok(Committed::Unchanged(contract));
    };
    contract.version = expected_version + 1;

    let change = ContractChange {
        contract: contract.clone(),
        expected_version,
        revenue: staged.revenue,
        events: staged.events,
    };
    match contracts.commit(change).await? {
        CommitOutcome::Committed => Ok(Committed::Applied(contract)),
        CommitOutcome::DuplicateRevenue => Ok(Committed::DuplicateRevenue(loaded)),
        CommitOutcome::VersionConflict => {
            tracing::info!(
                contract_id = %id,
                expected_version,
                "Contract changed since it was loaded"
            );
            Err(ContractError::ConcurrentModification(id))
        }
    }
}

/// Deletes `id` once `check` accepts the stored contract, retrying on version races.
///
/// Returns the contract as deleted, or `None` if it was already gone.
pub(crate) async fn delete_with_retry<F>(
    contracts: &dyn ContractRepository,
    id: ContractId,
    check: F,
) -> Result<Option<Contract>, ContractError>
where
    F: Fn(&Contract) -> Result<(), ContractError> + Send + Sync,
{
    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let Some(contract) = contracts.find_by_id(&id).await? else {
            return Ok(None);
        };
        check(&contract)?;
        if contracts.delete_if_version(&id, contract.version).await? {
            return Ok(Some(contract));
        }
    }
    Err(ContractError::ConcurrentModification(id))
}
