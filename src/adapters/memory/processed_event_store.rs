//! In-memory processed event store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::lock;
use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    processed: Mutex<HashMap<(String, String), Timestamp>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.processed).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(event_id: &EventId, handler_name: &str) -> (String, String) {
    (event_id.as_str().to_string(), handler_name.to_string())
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        Ok(lock(&self.processed).contains_key(&key(event_id, handler_name)))
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        lock(&self.processed)
            .entry(key(event_id, handler_name))
            .or_insert_with(Timestamp::now);
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut processed = lock(&self.processed);
        let before = processed.len();
        processed.retain(|_, at| !at.is_before(&timestamp));
        Ok((before - processed.len()) as u64)
    }
}
