//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresContractRepository` - Versioned contracts with revenue and outbox in one transaction
//! - `PostgresOutboxWriter` - Outbox reads and status updates for the publisher
//! - `PostgresPartyDirectory` - Payout accounts, billing customers, licensor policy
//! - `PostgresWebhookEventRepository` - Webhook audit trail
//! - `PostgresProcessedEventStore` - Event handler idempotency
//!
//! Schema lives in `migrations/` and is applied with `sqlx::migrate!`.

mod contract_repository;
mod outbox;
mod party_directory;
mod processed_event_store;
mod webhook_event_repository;

pub use contract_repository::PostgresContractRepository;
pub use outbox::PostgresOutboxWriter;
pub use party_directory::PostgresPartyDirectory;
pub use processed_event_store::PostgresProcessedEventStore;
pub use webhook_event_repository::PostgresWebhookEventRepository;
