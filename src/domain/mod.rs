//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, events, errors)
//! - `pricing` - Fair-share pricing engine and niche reference data
//! - `contract` - Contract aggregate, state machine and gateway reconciliation rules

pub mod contract;
pub mod foundation;
pub mod pricing;
