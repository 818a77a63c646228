//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port for Stripe Connect, including:
//! - Customers for metered licensees
//! - Per-contract metered prices
//! - One-time and subscription checkout sessions with application fees
//! - Usage records
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod mock_payment_provider;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_provider::{MethodCall, MockPaymentProvider, WebhookVerifyMode};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{
    SignatureHeader, SignatureParseError, StripeCheckoutSession, StripeInvoice,
    StripeSubscription, StripeWebhookEvent, CONTRACT_ID_METADATA_KEY,
};
