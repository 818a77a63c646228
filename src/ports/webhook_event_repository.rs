//! WebhookEventRepository port - audit trail of gateway webhooks.
//!
//! Each verified webhook is recorded under the gateway's event id once
//! it has been handled. A redelivery of a recorded event short-circuits
//! before any work. Failed deliveries are not recorded, so the gateway's
//! own retry reprocesses them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{DomainError, Timestamp};

/// How a webhook was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDisposition {
    /// A contract changed or revenue was recorded.
    Applied,
    /// Matched a contract but changed nothing.
    Unchanged,
    /// Unknown type or no matching contract.
    Ignored,
}

impl WebhookDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookDisposition::Applied => "applied",
            WebhookDisposition::Unchanged => "unchanged",
            WebhookDisposition::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(WebhookDisposition::Applied),
            "unchanged" => Some(WebhookDisposition::Unchanged),
            "ignored" => Some(WebhookDisposition::Ignored),
            _ => None,
        }
    }
}

impl fmt::Display for WebhookDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a handled webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Gateway event id (`evt_...`).
    pub event_id: String,

    /// Gateway event type (e.g. `invoice.paid`).
    pub event_type: String,

    pub disposition: WebhookDisposition,

    /// Contract the event resolved to, if any.
    pub contract_id: Option<String>,

    /// Reason for `Ignored`.
    pub note: Option<String>,

    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        disposition: WebhookDisposition,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            disposition,
            contract_id: None,
            note: None,
            processed_at: Timestamp::now(),
        }
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for storing handled webhook events.
///
/// Implementations should key on `event_id` with insert-if-absent
/// semantics so concurrent deliveries do not race.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(&self, event_id: &str)
        -> Result<Option<WebhookEventRecord>, DomainError>;

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Retention cleanup. Returns the number of rows removed.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
