//! ProcessedEventStore port - per-handler record of handled events.
//!
//! The outbox delivers at-least-once. Handlers with external side effects
//! (document generation) consult this store so each event id is acted on
//! once per handler.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Tracks `(event_id, handler_name)` pairs.
///
/// ```ignore
/// if store.contains(&event_id, "DocumentDispatch").await? {
///     return Ok(());
/// }
/// // ...side effect...
/// store.mark_processed(&event_id, "DocumentDispatch").await?;
/// ```
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// True if `handler_name` already handled `event_id`.
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Record a successful handling. Repeated calls are harmless.
    async fn mark_processed(&self, event_id: &EventId, handler_name: &str)
        -> Result<(), DomainError>;

    /// Retention cleanup. Returns the number of rows removed.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
