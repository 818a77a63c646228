//! In-memory contract store.
//!
//! Implements `ContractRepository` and `OutboxWriter` over one mutex so a
//! commit (contract row, revenue row, outbox rows) is atomic, mirroring
//! the single transaction of the PostgreSQL adapter.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::lock;
use crate::domain::contract::{Contract, ContractEvent, RevenueEvent};
use crate::domain::foundation::{
    ContractId, DomainError, ErrorCode, EventEnvelope, SerializableDomainEvent, StateMachine,
    UserId, VideoId,
};
use crate::ports::{
    CommitOutcome, ContractChange, ContractRepository, InsertOutcome, OutboxEntry, OutboxStatus,
    OutboxWriter, ReconcileCursor,
};

#[derive(Default)]
struct StoreState {
    contracts: HashMap<ContractId, Contract>,
    revenue: Vec<RevenueEvent>,
    outbox: Vec<OutboxEntry>,
}

impl StoreState {
    /// Another contract that blocks `contract`'s triple, if `contract` itself is blocking.
    fn blocking_conflict(&self, contract: &Contract) -> Option<ContractId> {
        if !contract.status.blocks_new_request() {
            return None;
        }
        self.contracts
            .values()
            .find(|other| {
                other.id != contract.id
                    && other.status.blocks_new_request()
                    && other.licensee_id == contract.licensee_id
                    && other.original_video.video_id == contract.original_video.video_id
                    && other.reaction_video_id == contract.reaction_video_id
            })
            .map(|other| other.id)
    }

    fn append_events(
        &mut self,
        contract_id: &ContractId,
        events: &[ContractEvent],
    ) -> Result<(), DomainError> {
        let partition_key = contract_id.to_string();
        for event in events {
            let envelope = event.to_envelope()?;
            self.outbox.push(OutboxEntry::new(envelope, partition_key.clone()));
        }
        Ok(())
    }
}

/// Contract store held in process memory.
///
/// ```ignore
/// let store = Arc::new(InMemoryContractStore::new());
/// let repo: Arc<dyn ContractRepository> = store.clone();
/// let outbox: Arc<dyn OutboxWriter> = store.clone();
/// ```
#[derive(Default)]
pub struct InMemoryContractStore {
    state: Mutex<StoreState>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored contract, bypassing the port.
    pub fn contract(&self, id: &ContractId) -> Option<Contract> {
        lock(&self.state).contracts.get(id).cloned()
    }

    /// Seeds a contract as-is, without outbox events or uniqueness checks.
    pub fn put(&self, contract: Contract) {
        lock(&self.state).contracts.insert(contract.id, contract);
    }

    pub fn contract_count(&self) -> usize {
        lock(&self.state).contracts.len()
    }

    /// Recorded revenue, oldest first.
    pub fn revenue_events(&self) -> Vec<RevenueEvent> {
        lock(&self.state).revenue.clone()
    }

    pub fn revenue_for(&self, contract_id: &ContractId) -> Vec<RevenueEvent> {
        lock(&self.state)
            .revenue
            .iter()
            .filter(|r| r.contract_id == *contract_id)
            .cloned()
            .collect()
    }

    /// All outbox entries regardless of status.
    pub fn outbox_entries(&self) -> Vec<OutboxEntry> {
        lock(&self.state).outbox.clone()
    }

    /// Event types written to the outbox for one contract, in order.
    pub fn outbox_event_types(&self, contract_id: &ContractId) -> Vec<String> {
        let key = contract_id.to_string();
        lock(&self.state)
            .outbox
            .iter()
            .filter(|e| e.partition_key == key)
            .map(|e| e.event.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl ContractRepository for InMemoryContractStore {
    async fn insert(
        &self,
        contract: &Contract,
        events: &[ContractEvent],
    ) -> Result<InsertOutcome, DomainError> {
        let mut state = lock(&self.state);
        if state.contracts.contains_key(&contract.id) {
            return Ok(InsertOutcome::IdTaken);
        }
        if state.blocking_conflict(contract).is_some() {
            return Ok(InsertOutcome::TripleTaken);
        }
        state.append_events(&contract.id, events)?;
        state.contracts.insert(contract.id, contract.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_id(&self, id: &ContractId) -> Result<Option<Contract>, DomainError> {
        Ok(self.contract(id))
    }

    async fn find_blocking(
        &self,
        licensee_id: &UserId,
        original_video_id: &VideoId,
        reaction_video_id: Option<&VideoId>,
    ) -> Result<Option<Contract>, DomainError> {
        let state = lock(&self.state);
        Ok(state
            .contracts
            .values()
            .filter(|c| {
                c.status.blocks_new_request()
                    && c.licensee_id == *licensee_id
                    && c.original_video.video_id == *original_video_id
                    && c.reaction_video_id.as_ref() == reaction_video_id
            })
            .min_by_key(|c| c.created_at)
            .cloned())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Contract>, DomainError> {
        let state = lock(&self.state);
        Ok(state
            .contracts
            .values()
            .find(|c| c.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<Contract>, DomainError> {
        let state = lock(&self.state);
        Ok(state
            .contracts
            .values()
            .find(|c| c.session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn find_reconcilable(
        &self,
        after: Option<ReconcileCursor>,
        limit: u32,
    ) -> Result<Vec<Contract>, DomainError> {
        let state = lock(&self.state);
        let mut candidates: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| {
                c.status.is_reconcilable()
                    && (c.subscription_id.is_some() || c.session_id.is_some())
                    && after.map_or(true, |cursor| cursor.precedes(c))
            })
            .cloned()
            .collect();
        candidates.sort_by_key(|c| (c.created_at, c.id));
        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    async fn commit(&self, change: ContractChange) -> Result<CommitOutcome, DomainError> {
        let mut state = lock(&self.state);
        let id = change.contract.id;

        match state.contracts.get(&id) {
            Some(stored) if stored.version == change.expected_version => {}
            _ => return Ok(CommitOutcome::VersionConflict),
        }

        if let Some(revenue) = &change.revenue {
            if state
                .revenue
                .iter()
                .any(|r| r.external_id == revenue.external_id)
            {
                return Ok(CommitOutcome::DuplicateRevenue);
            }
        }

        if let Some(existing) = state.blocking_conflict(&change.contract) {
            return Err(
                DomainError::new(ErrorCode::DuplicateError, "blocking contract exists for triple")
                    .with_detail("existing", existing.to_string()),
            );
        }

        state.append_events(&id, &change.events)?;
        if let Some(revenue) = change.revenue {
            state.revenue.push(revenue);
        }
        state.contracts.insert(id, change.contract);
        Ok(CommitOutcome::Committed)
    }

    async fn delete_if_version(
        &self,
        id: &ContractId,
        expected_version: i64,
    ) -> Result<bool, DomainError> {
        let mut state = lock(&self.state);
        match state.contracts.get(id) {
            Some(stored) if stored.version == expected_version => {
                state.contracts.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl OutboxWriter for InMemoryContractStore {
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = OutboxEntry::new(event.clone(), partition_key);
        lock(&self.state).outbox.push(entry.clone());
        Ok(entry)
    }

    async fn write_batch(
        &self,
        events: &[EventEnvelope],
        partition_key: &str,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let entries: Vec<OutboxEntry> = events
            .iter()
            .map(|event| OutboxEntry::new(event.clone(), partition_key))
            .collect();
        lock(&self.state).outbox.extend(entries.iter().cloned());
        Ok(entries)
    }

    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError> {
        let state = lock(&self.state);
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.is_deliverable())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = lock(&self.state);
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.record_attempt(Ok(()));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        let mut state = lock(&self.state);
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.record_attempt(Err(error));
        }
        Ok(())
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - Duration::hours(i64::from(older_than_hours));
        let mut state = lock(&self.state);
        let before = state.outbox.len();
        state.outbox.retain(|e| {
            !(e.status == OutboxStatus::Published && e.processed_at.map_or(false, |t| t < cutoff))
        });
        Ok((before - state.outbox.len()) as u64)
    }
}
