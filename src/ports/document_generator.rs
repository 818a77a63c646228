//! Document generator port - external licence document service.
//!
//! Generation is fire-and-forget from the engine's point of view:
//! failures are logged by callers and never roll back a transition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::ContractId;

/// Why a document is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentTrigger {
    LicensorAccepted,
    PaymentConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub contract_id: ContractId,
    pub trigger: DocumentTrigger,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document service unavailable: {0}")]
    Unavailable(String),

    #[error("document service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn request_generation(&self, request: DocumentRequest) -> Result<(), DocumentError>;
}
