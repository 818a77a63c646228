//! Contract repository port - durable Contract store.
//!
//! Every mutation is a single atomic read-modify-write guarded by the
//! contract `version`. Revenue rows and outbox events are written in the
//! same transaction as the contract row they belong to.

use async_trait::async_trait;

use crate::domain::contract::{Contract, ContractEvent, RevenueEvent};
use crate::domain::foundation::{ContractId, DomainError, Timestamp, UserId, VideoId};

/// Result of inserting a new contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Primary key already used.
    IdTaken,
    /// A blocking contract exists for the same licensee / original / reaction triple.
    TripleTaken,
}

/// A versioned change to an existing contract.
#[derive(Debug, Clone)]
pub struct ContractChange {
    /// Contract state to persist. Its `version` is the new version.
    pub contract: Contract,
    /// Version the change was computed from.
    pub expected_version: i64,
    /// Revenue to record atomically with the change.
    pub revenue: Option<RevenueEvent>,
    /// Events to append to the outbox.
    pub events: Vec<ContractEvent>,
}

/// Result of committing a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The stored version moved on; reload and retry.
    VersionConflict,
    /// The revenue row already exists; the whole change was discarded.
    DuplicateRevenue,
}

/// Keyset position in the reconciliation scan.
///
/// Contracts are scanned in `(created_at, id)` order, which never changes
/// for a row, so a sweep visits every candidate exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileCursor {
    pub created_at: Timestamp,
    pub id: ContractId,
}

impl ReconcileCursor {
    /// Cursor positioned just after `contract`.
    pub fn after(contract: &Contract) -> Self {
        Self {
            created_at: contract.created_at,
            id: contract.id,
        }
    }

    /// True if `contract` sorts after this cursor.
    pub fn precedes(&self, contract: &Contract) -> bool {
        (contract.created_at, contract.id) > (self.created_at, self.id)
    }
}

/// Port for contract persistence.
#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Insert a new contract with its creation events.
    ///
    /// Uniqueness of the id and of the blocking triple must be enforced
    /// by the store itself, not by a prior read.
    async fn insert(
        &self,
        contract: &Contract,
        events: &[ContractEvent],
    ) -> Result<InsertOutcome, DomainError>;

    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, DomainError>;

    /// Find the contract blocking new requests for a triple, if any.
    async fn find_blocking(
        &self,
        licensee_id: &UserId,
        original_video_id: &VideoId,
        reaction_video_id: Option<&VideoId>,
    ) -> Result<Option<Contract>, DomainError>;

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Contract>, DomainError>;

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Contract>, DomainError>;

    /// Next page of contracts the gateway can still move (pending payment,
    /// active or payment failed) that carry a session or subscription id,
    /// in `(created_at, id)` order starting after `after`.
    async fn find_reconcilable(
        &self,
        after: Option<ReconcileCursor>,
        limit: u32,
    ) -> Result<Vec<Contract>, DomainError>;

    /// Apply a change if the stored version still equals `expected_version`.
    async fn commit(&self, change: ContractChange) -> Result<CommitOutcome, DomainError>;

    /// Delete the contract if its version still equals `expected_version`.
    ///
    /// Returns false if the contract is gone or has moved on.
    async fn delete_if_version(
        &self,
        id: &ContractId,
        expected_version: i64,
    ) -> Result<bool, DomainError>;
}
