//! Stripe-specific types for webhook handling and API responses.
//!
//! These types represent Stripe API objects as they arrive in webhook payloads
//! and API responses. They are designed to:
//! - Parse actual Stripe JSON accurately (unused fields are skipped)
//! - Map to port types for further processing
//! - Carry the contract id from object metadata

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::contract::SubscriptionStatus;
use crate::ports::{
    CheckoutSessionDetails, CheckoutSessionStatus, PaymentError, Subscription, WebhookEvent,
    WebhookEventData, WebhookEventType,
};

/// Metadata key carrying the contract id on sessions, subscriptions and prices.
pub const CONTRACT_ID_METADATA_KEY: &str = "contract_id";

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed Stripe-Signature header components.
///
/// The header format is `t=timestamp,v1=signature[,v1=signature...]`.
/// Stripe sends several `v1` entries while a signing secret is being rolled.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the payload.
    pub timestamp: i64,

    /// v1 signatures (HMAC-SHA256, hex-decoded).
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureParseError::MissingTimestamp)?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures.push(
                        hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Encode bytes to hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Event Types
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    /// Whether this is a live or test event.
    #[serde(default)]
    pub livemode: bool,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    /// Hosted checkout URL, present while the session is open.
    pub url: Option<String>,

    pub customer: Option<String>,

    pub subscription: Option<String>,

    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: Option<String>,

    /// `open`, `complete` or `expired`.
    pub status: Option<String>,

    /// `payment` or `subscription`.
    pub mode: String,

    pub amount_total: Option<i64>,

    pub currency: Option<String>,

    /// Unix timestamp.
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn contract_id(&self) -> Option<String> {
        self.metadata.get(CONTRACT_ID_METADATA_KEY).cloned()
    }

    /// Map to the port's session details.
    pub fn into_details(self) -> CheckoutSessionDetails {
        let status = match self.status.as_deref() {
            Some("complete") => CheckoutSessionStatus::Complete,
            Some("expired") => CheckoutSessionStatus::Expired,
            _ => CheckoutSessionStatus::Open,
        };
        let contract_id = self.contract_id().and_then(|s| s.parse().ok());

        CheckoutSessionDetails {
            id: self.id,
            status,
            payment_status: self.payment_status,
            url: self.url,
            subscription_id: self.subscription,
            customer_id: self.customer,
            amount_total: self.amount_total,
            currency: self.currency,
            contract_id,
        }
    }
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    /// Whether the customer has been deleted.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe Price object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    /// Price ID.
    pub id: String,

    /// Unit amount in minor units.
    pub unit_amount: Option<i64>,

    #[serde(default)]
    pub currency: String,

    pub recurring: Option<StripePriceRecurring>,
}

/// Price recurring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,

    /// Number of intervals between billings.
    pub interval_count: i32,

    /// `metered` or `licensed`.
    pub usage_type: Option<String>,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: String,

    pub status: String,

    /// Scheduled cancellation (Unix timestamp).
    pub cancel_at: Option<i64>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    pub fn contract_id(&self) -> Option<String> {
        self.metadata.get(CONTRACT_ID_METADATA_KEY).cloned()
    }

    /// Map to the port's subscription type.
    pub fn into_subscription(self) -> Subscription {
        Subscription {
            status: SubscriptionStatus::parse(&self.status),
            item_id: self.items.data.first().map(|item| item.id.clone()),
            id: self.id,
            customer_id: self.customer,
            cancel_at: self.cancel_at,
        }
    }
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    /// Item ID (si_...), the target of usage records.
    pub id: String,

    pub price: Option<StripePrice>,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: Option<String>,

    /// Associated subscription ID.
    pub subscription: Option<String>,

    /// Amount paid in minor units.
    #[serde(default)]
    pub amount_paid: i64,

    /// Currency (lowercase).
    pub currency: String,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Snapshot of the subscription's metadata at invoice time.
    pub subscription_details: Option<StripeSubscriptionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeSubscriptionDetails {
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeInvoice {
    /// Contract id from the invoice, falling back to its subscription's metadata.
    pub fn contract_id(&self) -> Option<String> {
        self.metadata
            .get(CONTRACT_ID_METADATA_KEY)
            .or_else(|| {
                self.subscription_details
                    .as_ref()
                    .and_then(|d| d.metadata.get(CONTRACT_ID_METADATA_KEY))
            })
            .cloned()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Type Mapping
// ════════════════════════════════════════════════════════════════════════════════

impl StripeWebhookEvent {
    /// Convert to the port's webhook event.
    ///
    /// Objects of handled event types must parse; unknown types keep the raw JSON.
    pub fn into_webhook_event(self) -> Result<WebhookEvent, PaymentError> {
        let event_type = WebhookEventType::parse(&self.event_type);
        let data = self.extract_event_data(&event_type)?;

        Ok(WebhookEvent {
            id: self.id,
            event_type,
            data,
            created_at: self.created,
        })
    }

    fn extract_event_data(
        &self,
        event_type: &WebhookEventType,
    ) -> Result<WebhookEventData, PaymentError> {
        let object = self.data.object.clone();

        match event_type {
            WebhookEventType::CheckoutSessionCompleted | WebhookEventType::CheckoutSessionExpired => {
                let session: StripeCheckoutSession = serde_json::from_value(object).map_err(|e| {
                    PaymentError::invalid_webhook(format!("Invalid checkout session: {}", e))
                })?;
                let contract_id = session.contract_id();

                Ok(WebhookEventData::Checkout {
                    session_id: session.id,
                    mode: session.mode,
                    payment_status: session.payment_status,
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                    amount_total: session.amount_total,
                    currency: session.currency,
                    contract_id,
                })
            }

            WebhookEventType::SubscriptionUpdated | WebhookEventType::SubscriptionDeleted => {
                let sub: StripeSubscription = serde_json::from_value(object).map_err(|e| {
                    PaymentError::invalid_webhook(format!("Invalid subscription: {}", e))
                })?;
                let contract_id = sub.contract_id();

                Ok(WebhookEventData::Subscription {
                    status: SubscriptionStatus::parse(&sub.status),
                    subscription_id: sub.id,
                    customer_id: sub.customer,
                    contract_id,
                })
            }

            WebhookEventType::InvoicePaid | WebhookEventType::InvoicePaymentFailed => {
                let invoice: StripeInvoice = serde_json::from_value(object).map_err(|e| {
                    PaymentError::invalid_webhook(format!("Invalid invoice: {}", e))
                })?;
                let contract_id = invoice.contract_id();

                Ok(WebhookEventData::Invoice {
                    invoice_id: invoice.id,
                    customer_id: invoice.customer,
                    subscription_id: invoice.subscription,
                    amount_paid: invoice.amount_paid,
                    currency: invoice.currency,
                    contract_id,
                })
            }

            WebhookEventType::Unknown(_) => Ok(WebhookEventData::Raw {
                json: object.to_string(),
            }),
        }
    }
}
