//! Durable queue of contract events awaiting delivery.
//!
//! Events land here in the same transaction as the contract row that
//! produced them. `OutboxPublisher` drains pending and failed entries onto
//! the event bus, so a side effect whose handler fails is attempted again
//! on the next poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EventEnvelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Published,
    /// Eligible for another attempt.
    Failed,
}

/// One queued event and its delivery bookkeeping.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub event: EventEnvelope,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    /// Time of the last delivery attempt.
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Contract id; entries sharing a key are delivered in write order.
    pub partition_key: String,
}

impl OutboxEntry {
    pub fn new(event: EventEnvelope, partition_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            attempts: 0,
            last_error: None,
            partition_key: partition_key.into(),
        }
    }

    pub fn is_deliverable(&self) -> bool {
        self.status != OutboxStatus::Published
    }

    /// Apply the outcome of one delivery attempt.
    pub fn record_attempt(&mut self, outcome: Result<(), &str>) {
        self.attempts += 1;
        self.processed_at = Some(Utc::now());
        match outcome {
            Ok(()) => self.status = OutboxStatus::Published,
            Err(error) => {
                self.status = OutboxStatus::Failed;
                self.last_error = Some(error.to_string());
            }
        }
    }
}

/// Storage behind the outbox.
///
/// Contract commits enqueue through `ContractRepository::commit`; the
/// direct `write` methods exist for events raised outside a contract
/// transaction.
#[async_trait]
pub trait OutboxWriter: Send + Sync {
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError>;

    /// All-or-nothing enqueue of several events for one contract.
    async fn write_batch(
        &self,
        events: &[EventEnvelope],
        partition_key: &str,
    ) -> Result<Vec<OutboxEntry>, DomainError>;

    /// Up to `limit` deliverable entries, oldest first.
    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError>;

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError>;

    /// Record a failed attempt; the entry stays deliverable.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError>;

    /// Delete published entries processed more than `older_than_hours` ago.
    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError>;
}
