//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Contract store, outbox, webhook audit and party directory
//! - `stripe` - Payment gateway (plus an in-process mock)
//! - `documents` - HTTP client for the licence document service
//! - `memory` - In-process stores for tests and local runs
//! - `http` - Axum REST API
//! - `events` - Event bus, outbox publisher and idempotent handlers

pub mod documents;
pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;

pub use events::{IdempotentHandler, InMemoryEventBus, OutboxPublisher, OutboxPublisherConfig};
