//! Reaction Licensing - contract lifecycle and billing reconciliation.
//!
//! Licensees request the right to publish a reaction to a licensor's video;
//! contracts move through review, checkout and payment, and are kept in
//! step with the payment gateway by webhooks and a periodic sweep.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
