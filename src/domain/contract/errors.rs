//! Contract-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | Duplicate | 409 |
//! | IdConflict | 409 |
//! | AlreadySettled | 409 |
//! | InvalidState | 409 |
//! | ReactionVideoAlreadySet | 409 |
//! | ConcurrentModification | 409 |
//! | PayoutAccountMissing | 422 |
//! | MissingReactionVideo | 422 |
//! | SignatureInvalid | 401 |
//! | Forbidden | 403 |
//! | ValidationFailed | 400 |
//! | PaymentProvider | 502 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{ContractId, DomainError, ErrorCode, UserId, ValidationError};

use super::ContractStatus;

/// Contract-specific errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    /// Contract was not found.
    NotFound(ContractId),

    /// A blocking contract already exists for the licensee / original / reaction triple.
    Duplicate { existing: ContractId },

    /// The client-supplied id is already used by a contract for a different triple.
    IdConflict(ContractId),

    /// Payment has been confirmed; the operation no longer applies.
    AlreadySettled {
        id: ContractId,
        status: ContractStatus,
    },

    /// Licensor has no payout account configured.
    PayoutAccountMissing(UserId),

    /// Checkout requires a reaction video to be selected.
    MissingReactionVideo(ContractId),

    /// A different reaction video is already attached.
    ReactionVideoAlreadySet(ContractId),

    /// Webhook signature verification failed.
    SignatureInvalid,

    /// Invalid state for the requested operation.
    InvalidState {
        current: ContractStatus,
        attempted: String,
    },

    /// Caller is not the party allowed to perform the operation.
    Forbidden { reason: String },

    /// Repeated optimistic-lock failures.
    ConcurrentModification(ContractId),

    /// Payment gateway call failed.
    PaymentProvider { reason: String, retryable: bool },

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Infrastructure error.
    Infrastructure(String),
}

impl ContractError {
    pub fn not_found(id: ContractId) -> Self {
        ContractError::NotFound(id)
    }

    pub fn duplicate(existing: ContractId) -> Self {
        ContractError::Duplicate { existing }
    }

    pub fn already_settled(id: ContractId, status: ContractStatus) -> Self {
        ContractError::AlreadySettled { id, status }
    }

    pub fn invalid_state(current: ContractStatus, attempted: impl Into<String>) -> Self {
        ContractError::InvalidState {
            current,
            attempted: attempted.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ContractError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn payment_provider(reason: impl Into<String>, retryable: bool) -> Self {
        ContractError::PaymentProvider {
            reason: reason.into(),
            retryable,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ContractError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ContractError::NotFound(_) => ErrorCode::ContractNotFound,
            ContractError::Duplicate { .. } => ErrorCode::DuplicateError,
            ContractError::IdConflict(_) => ErrorCode::IdConflict,
            ContractError::AlreadySettled { .. } => ErrorCode::AlreadySettled,
            ContractError::PayoutAccountMissing(_) => ErrorCode::PayoutAccountMissing,
            ContractError::MissingReactionVideo(_) => ErrorCode::MissingReactionVideo,
            ContractError::ReactionVideoAlreadySet(_) | ContractError::InvalidState { .. } => {
                ErrorCode::InvalidStateTransition
            }
            ContractError::SignatureInvalid => ErrorCode::SignatureInvalid,
            ContractError::Forbidden { .. } => ErrorCode::Forbidden,
            ContractError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            ContractError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
            ContractError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            ContractError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            ContractError::NotFound(id) => format!("Contract not found: {}", id),
            ContractError::Duplicate { existing } => format!(
                "A contract for this video pair already exists: {}",
                existing
            ),
            ContractError::IdConflict(id) => {
                format!("Contract id {} is already used for different terms", id)
            }
            ContractError::AlreadySettled { id, status } => {
                format!("Contract {} is already settled ({})", id, status)
            }
            ContractError::PayoutAccountMissing(licensor) => {
                format!("Licensor {} has no payout account configured", licensor)
            }
            ContractError::MissingReactionVideo(id) => {
                format!("Select a reaction video for contract {} before checkout", id)
            }
            ContractError::ReactionVideoAlreadySet(id) => {
                format!("Contract {} already has a reaction video", id)
            }
            ContractError::SignatureInvalid => "Invalid webhook signature".to_string(),
            ContractError::InvalidState { current, attempted } => {
                format!("Cannot {} contract in {} state", attempted, current)
            }
            ContractError::Forbidden { reason } => format!("Forbidden: {}", reason),
            ContractError::ConcurrentModification(id) => {
                format!("Contract {} was modified concurrently, please retry", id)
            }
            ContractError::PaymentProvider { reason, .. } => {
                format!("Payment provider error: {}", reason)
            }
            ContractError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            ContractError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContractError::Infrastructure(_) | ContractError::ConcurrentModification(_) => true,
            ContractError::PaymentProvider { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ContractError {}

impl From<DomainError> for ContractError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => ContractError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::DuplicateError => match err
                .details
                .get("existing")
                .and_then(|id| id.parse::<ContractId>().ok())
            {
                Some(existing) => ContractError::Duplicate { existing },
                None => ContractError::Infrastructure(err.to_string()),
            },
            _ => ContractError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for ContractError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        ContractError::ValidationFailed {
            field,
            message: err.to_string(),
        }
    }
}
