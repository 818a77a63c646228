//! Contract domain module.
//!
//! Licensing agreements between a licensor and a licensee, and the state
//! machine that both caller actions and payment-gateway facts drive.
//!
//! # Module Structure
//!
//! - `aggregate` - Contract aggregate and caller-facing transitions
//! - `gateway` - Gateway facts and their idempotent application
//! - `status` - ContractStatus state machine
//! - `events` - Domain events written to the outbox
//! - `revenue` - Revenue records keyed by gateway id
//! - `parties` - Licensor / licensee permission checks
//! - `policy` - Licensor policy snapshot
//! - `errors` - ContractError

mod aggregate;
mod errors;
mod events;
mod gateway;
mod parties;
mod policy;
mod revenue;
mod status;

pub use aggregate::{
    Contract, FairShare, LicenceRequest, NewContract, Transition, VideoSnapshot,
};
pub use errors::ContractError;
pub use events::{
    ContractEvent, ContractEventKind, CONTRACT_ACCEPTED, CONTRACT_PAYMENT_CONFIRMED,
    CONTRACT_TERM_END_REQUESTED,
};
pub use gateway::{
    FactOutcome, GatewayFact, SubscriptionStatus, LICENSE_TERM_YEARS,
};
pub use parties::Party;
pub use policy::LicensorPolicy;
pub use revenue::{RevenueEvent, RevenueKind};
pub use status::ContractStatus;
