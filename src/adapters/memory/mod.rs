//! In-memory adapters.
//!
//! Single-process implementations of the persistence and collaborator
//! ports. They enforce the same uniqueness rules as the PostgreSQL
//! adapters so handlers behave identically against either.

mod contract_store;
mod document_generator;
mod party_directory;
mod processed_event_store;
mod webhook_event_repository;

pub use contract_store::InMemoryContractStore;
pub use document_generator::RecordingDocumentGenerator;
pub use party_directory::InMemoryPartyDirectory;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use webhook_event_repository::InMemoryWebhookEventRepository;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
