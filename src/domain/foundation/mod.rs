//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event infrastructure and error
//! types that form the vocabulary of the licensing domain.

mod errors;
mod events;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent};
pub use ids::{ContractId, UserId, VideoId};
pub use money::{Percentage, Price};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
