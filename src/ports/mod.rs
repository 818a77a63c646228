//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `ContractRepository` - Versioned contract store with revenue and outbox writes
//! - `PartyDirectory` - Payout accounts, billing customers and licensor policy
//! - `WebhookEventRepository` - Gateway webhook audit and redelivery detection
//!
//! ## External Service Ports
//!
//! - `PaymentProvider` - Payment gateway (checkout, subscriptions, usage, webhooks)
//! - `DocumentGenerator` - Licence document service
//!
//! ## Event Ports
//!
//! - `OutboxWriter` - Transactional event persistence for guaranteed delivery
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - Event bus
//! - `ProcessedEventStore` - Idempotency tracking for event handlers

mod contract_repository;
mod document_generator;
mod event_publisher;
mod event_subscriber;
mod outbox_writer;
mod party_directory;
mod payment_provider;
mod processed_event_store;
mod webhook_event_repository;

pub use contract_repository::{
    CommitOutcome, ContractChange, ContractRepository, InsertOutcome, ReconcileCursor,
};
pub use document_generator::{DocumentError, DocumentGenerator, DocumentRequest, DocumentTrigger};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use outbox_writer::{OutboxEntry, OutboxStatus, OutboxWriter};
pub use party_directory::PartyDirectory;
pub use payment_provider::{
    CheckoutMode, CheckoutSession, CheckoutSessionDetails, CheckoutSessionStatus,
    CreateCheckoutRequest, CreateCustomerRequest, CreateMeteredPriceRequest, Customer,
    MeteredPrice, PaymentError, PaymentErrorCode, PaymentProvider, Subscription, UsageReport,
    WebhookEvent, WebhookEventData, WebhookEventType,
};
pub use processed_event_store::ProcessedEventStore;
pub use webhook_event_repository::{
    SaveResult, WebhookDisposition, WebhookEventRecord, WebhookEventRepository,
};
