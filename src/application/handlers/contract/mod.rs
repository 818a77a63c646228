//! Contract handlers.
//!
//! Command and query handlers for the contract lifecycle:
//!
//! ## Commands
//! - Creating, accepting, rejecting and withdrawing contracts
//! - Attaching the reaction video and starting checkout
//! - Abandoning checkout and admin deletion
//! - Reporting metered usage
//! - Processing payment webhooks
//!
//! ## Background
//! - Reconciliation sweep against the payment gateway
//! - Document dispatch from outbox events
//! - End-of-term subscription scheduling from outbox events
//!
//! ## Queries
//! - Get contract details

mod abandon_checkout;
mod accept_contract;
mod apply_gateway_fact;
mod attach_reaction_video;
mod checkout_teardown;
mod commit;
mod create_contract;
mod delete_contract;
mod document_dispatch;
mod get_contract;
mod handle_payment_webhook;
mod reconcile_contracts;
mod reject_contract;
mod report_usage;
mod session_facts;
mod start_checkout;
mod term_end_scheduler;
mod withdraw_contract;

#[cfg(test)]
mod test_support;

pub use apply_gateway_fact::{FactApplication, GatewayFactApplier};
pub use commit::{ContractUpdate, MAX_COMMIT_ATTEMPTS};

// Commands
pub use abandon_checkout::{AbandonCheckoutCommand, AbandonCheckoutHandler, AbandonCheckoutResult};
pub use accept_contract::{AcceptContractCommand, AcceptContractHandler};
pub use attach_reaction_video::{AttachReactionVideoCommand, AttachReactionVideoHandler};
pub use create_contract::{CreateContractCommand, CreateContractHandler, CreateContractResult};
pub use delete_contract::{DeleteContractCommand, DeleteContractHandler, DeleteContractResult};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use reject_contract::{RejectContractCommand, RejectContractHandler};
pub use report_usage::{ReportUsageCommand, ReportUsageHandler, ReportUsageResult};
pub use start_checkout::{
    CheckoutSettings, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
};
pub use withdraw_contract::{
    WithdrawContractCommand, WithdrawContractHandler, WithdrawContractResult,
};

// Background
pub use document_dispatch::{DocumentDispatchHandler, DOCUMENT_EVENT_TYPES};
pub use reconcile_contracts::{ReconcileContractsHandler, SweepSummary, SweeperSettings};
pub use term_end_scheduler::{TermEndScheduler, TERM_END_EVENT_TYPES};

// Queries
pub use get_contract::{GetContractHandler, GetContractQuery};
