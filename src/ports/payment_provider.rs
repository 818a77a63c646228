//! Payment provider port for external payment processing.
//!
//! Defines the contract for payment gateway integrations (e.g., Stripe).
//! Implementations create customers, metered prices and checkout sessions,
//! report usage, and verify inbound webhooks.
//!
//! # Design
//!
//! - **Gateway agnostic**: Interface works with any payment provider
//! - **Idempotent**: Creating calls carry an idempotency key so retries never double-charge

use crate::domain::contract::{ContractError, SubscriptionStatus};
use crate::domain::foundation::{ContractId, DomainError, ErrorCode, Percentage, Timestamp, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer in the payment system.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Create a recurring, usage-metered price scoped to one contract.
    async fn create_metered_price(
        &self,
        request: CreateMeteredPriceRequest,
    ) -> Result<MeteredPrice, PaymentError>;

    /// Create a checkout session for payment or subscription.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, PaymentError>;

    /// Expire an open checkout session so it can no longer be paid.
    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), PaymentError>;

    async fn retrieve_subscription(&self, subscription_id: &str)
        -> Result<Subscription, PaymentError>;

    /// Ask the gateway to end the subscription at `cancel_at`.
    async fn schedule_subscription_cancellation(
        &self,
        subscription_id: &str,
        cancel_at: Timestamp,
    ) -> Result<(), PaymentError>;

    /// Report metered usage (an increment) for a subscription.
    async fn report_usage(&self, report: UsageReport) -> Result<(), PaymentError>;

    /// Verify and parse a webhook event.
    ///
    /// Returns error if signature is invalid.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user ID (stored as metadata).
    pub user_id: UserId,

    pub email: Option<String>,

    pub idempotency_key: String,
}

/// Customer from payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Provider's customer ID.
    pub id: String,

    pub email: Option<String>,
}

/// Request to create a metered price for a contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeteredPriceRequest {
    pub contract_id: ContractId,

    pub product_name: String,

    /// Price per 1,000 views in minor units.
    pub unit_amount_minor: i64,

    pub currency: String,

    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeteredPrice {
    pub id: String,
}

/// Billing shape of a checkout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CheckoutMode {
    /// Single charge with a flat application fee.
    OneTime {
        amount_minor: i64,
        currency: String,
        product_name: String,
        application_fee_minor: i64,
    },

    /// Metered subscription with a percentage application fee on each invoice.
    Subscription {
        customer_id: String,
        price_id: String,
        application_fee_percent: Percentage,
    },
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Embedded as correlation metadata.
    pub contract_id: ContractId,

    pub mode: CheckoutMode,

    /// Licensor's connected account receiving the transfer.
    pub destination_account: String,

    /// URL to redirect after successful checkout.
    pub success_url: String,

    /// URL to redirect after canceled checkout.
    pub cancel_url: String,

    pub idempotency_key: String,
}

/// Checkout session for payment completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID.
    pub id: String,

    /// URL for customer to complete checkout.
    pub url: String,

    /// When the session expires (Unix timestamp).
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSessionStatus {
    Open,
    Complete,
    Expired,
}

/// Current state of a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionDetails {
    pub id: String,

    pub status: CheckoutSessionStatus,

    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,

    /// Redirect URL while the session is open.
    pub url: Option<String>,

    pub subscription_id: Option<String>,

    pub customer_id: Option<String>,

    pub amount_total: Option<i64>,

    pub currency: Option<String>,

    /// Contract id from session metadata.
    pub contract_id: Option<ContractId>,
}

impl CheckoutSessionDetails {
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }
}

/// Subscription from payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,

    pub customer_id: String,

    pub status: SubscriptionStatus,

    /// Metered subscription item receiving usage records.
    pub item_id: Option<String>,

    /// Scheduled cancellation (Unix timestamp).
    pub cancel_at: Option<i64>,
}

/// Usage increment for a metered subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub subscription_id: String,

    /// Views since the last report.
    pub quantity: i64,

    pub timestamp: Timestamp,

    pub idempotency_key: String,
}

/// Webhook event from payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider.
    pub id: String,

    /// Event type.
    pub event_type: WebhookEventType,

    /// Event payload (provider-specific).
    pub data: WebhookEventData,

    /// When the event occurred (Unix timestamp).
    pub created_at: i64,
}

/// Types of webhook events we handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    CheckoutSessionExpired,
    InvoicePaid,
    InvoicePaymentFailed,
    SubscriptionUpdated,
    SubscriptionDeleted,

    /// Unknown event type.
    Unknown(String),
}

impl WebhookEventType {
    /// Maps a gateway event type string.
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => WebhookEventType::CheckoutSessionCompleted,
            "checkout.session.expired" => WebhookEventType::CheckoutSessionExpired,
            "invoice.paid" => WebhookEventType::InvoicePaid,
            "invoice.payment_failed" => WebhookEventType::InvoicePaymentFailed,
            "customer.subscription.updated" => WebhookEventType::SubscriptionUpdated,
            "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }

    /// Gateway event type string.
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::CheckoutSessionCompleted => "checkout.session.completed",
            WebhookEventType::CheckoutSessionExpired => "checkout.session.expired",
            WebhookEventType::InvoicePaid => "invoice.paid",
            WebhookEventType::InvoicePaymentFailed => "invoice.payment_failed",
            WebhookEventType::SubscriptionUpdated => "customer.subscription.updated",
            WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted",
            WebhookEventType::Unknown(s) => s,
        }
    }
}

/// Webhook event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEventData {
    /// Checkout session data.
    #[serde(rename = "checkout")]
    Checkout {
        session_id: String,
        /// `payment` or `subscription`.
        mode: String,
        payment_status: Option<String>,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        amount_total: Option<i64>,
        currency: Option<String>,
        contract_id: Option<String>,
    },

    /// Subscription data.
    #[serde(rename = "subscription")]
    Subscription {
        subscription_id: String,
        customer_id: String,
        status: SubscriptionStatus,
        contract_id: Option<String>,
    },

    /// Invoice data.
    #[serde(rename = "invoice")]
    Invoice {
        invoice_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        amount_paid: i64,
        currency: String,
        contract_id: Option<String>,
    },

    /// Raw/unknown event data.
    #[serde(rename = "raw")]
    Raw { json: String },
}

impl WebhookEventData {
    /// Contract id carried in object metadata, if parseable.
    pub fn contract_id(&self) -> Option<ContractId> {
        let raw = match self {
            WebhookEventData::Checkout { contract_id, .. }
            | WebhookEventData::Subscription { contract_id, .. }
            | WebhookEventData::Invoice { contract_id, .. } => contract_id.as_deref(),
            WebhookEventData::Raw { .. } => None,
        };
        raw.and_then(|s| s.parse().ok())
    }
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Create with provider code.
    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(
            PaymentErrorCode::NotFound,
            format!("{} not found", resource),
        )
    }

    /// Create an invalid webhook error.
    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    /// Create a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::NotFound => ErrorCode::NotFound,
            PaymentErrorCode::InvalidWebhook => ErrorCode::SignatureInvalid,
            _ => ErrorCode::PaymentProviderError,
        };

        DomainError::new(code, err.message)
    }
}

impl From<PaymentError> for ContractError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => ContractError::SignatureInvalid,
            _ => ContractError::payment_provider(err.to_string(), err.retryable),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// API authentication failed.
    AuthenticationError,

    /// Card was declined.
    CardDeclined,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Idempotency key reused with different parameters.
    IdempotencyConflict,

    /// Invalid webhook signature.
    InvalidWebhook,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::IdempotencyConflict => "idempotency_conflict",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
