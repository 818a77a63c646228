//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API:
//! customers, metered prices, Connect checkout sessions with application
//! fees, usage records and webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Idempotency
//!
//! Every creating call sends the request's idempotency key in the
//! `Idempotency-Key` header, so a retried call returns the original object.
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutMode, CheckoutSession, CheckoutSessionDetails, CreateCheckoutRequest,
    CreateCustomerRequest, CreateMeteredPriceRequest, Customer, MeteredPrice, PaymentError,
    PaymentErrorCode, PaymentProvider, Subscription, UsageReport, WebhookEvent,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCheckoutSession, StripeCustomer, StripePrice,
    StripeSubscription, StripeWebhookEvent, CONTRACT_ID_METADATA_KEY,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Metered prices bill once per quarter.
const METERED_INTERVAL: &str = "month";
const METERED_INTERVAL_COUNT: &str = "3";

/// Usage is reported in views; prices are quoted per 1,000 views.
const VIEWS_PER_BILLING_UNIT: &str = "1000";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to reject test mode events.
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe error envelope.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// POST a form, optionally with an idempotency key, and decode the response.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params);

        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        Self::decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        Self::decode(path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(path, status = status.as_u16(), error = %error_text, "Stripe API call failed");
            return Err(Self::error_from_status(status, &error_text));
        }

        response.json().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }

    /// Classify a non-2xx Stripe response.
    fn error_from_status(status: reqwest::StatusCode, body: &str) -> PaymentError {
        let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);
        let message = detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| format!("Stripe API error: {}", body));

        let reused_key = detail.as_ref().and_then(|d| d.kind.as_deref()) == Some("idempotency_error");
        let code = match status.as_u16() {
            _ if reused_key => PaymentErrorCode::IdempotencyConflict,
            401 => PaymentErrorCode::AuthenticationError,
            402 => PaymentErrorCode::CardDeclined,
            404 => PaymentErrorCode::NotFound,
            409 => PaymentErrorCode::IdempotencyConflict,
            429 => PaymentErrorCode::RateLimitExceeded,
            s if s >= 500 => PaymentErrorCode::NetworkError,
            _ => PaymentErrorCode::ProviderError,
        };

        let error = PaymentError::new(code, message);
        match detail.and_then(|d| d.code) {
            Some(provider_code) => error.with_provider_code(provider_code),
            None => error,
        }
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// # Security
    ///
    /// - Uses constant-time comparison to prevent timing attacks
    /// - Validates timestamp to prevent replay attacks
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|e| PaymentError::invalid_webhook(e.to_string()))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        let expected_bytes: &[u8] = expected.as_slice();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| expected_bytes.ct_eq(provided.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!(
                expected_signature = hex_encode(expected_bytes),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a verified payload into the port's event type.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        stripe_event.into_webhook_event()
    }

    /// Form parameters for a checkout session.
    fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(&'static str, String)> {
        let contract_id = request.contract_id.to_string();
        let mut params = vec![
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", contract_id.clone()),
            ("metadata[contract_id]", contract_id.clone()),
        ];

        match &request.mode {
            CheckoutMode::OneTime {
                amount_minor,
                currency,
                product_name,
                application_fee_minor,
            } => {
                params.extend([
                    ("mode", "payment".to_string()),
                    ("line_items[0][price_data][currency]", currency.clone()),
                    ("line_items[0][price_data][unit_amount]", amount_minor.to_string()),
                    ("line_items[0][price_data][product_data][name]", product_name.clone()),
                    ("line_items[0][quantity]", "1".to_string()),
                    (
                        "payment_intent_data[application_fee_amount]",
                        application_fee_minor.to_string(),
                    ),
                    (
                        "payment_intent_data[transfer_data][destination]",
                        request.destination_account.clone(),
                    ),
                    ("payment_intent_data[metadata][contract_id]", contract_id),
                ]);
            }
            CheckoutMode::Subscription {
                customer_id,
                price_id,
                application_fee_percent,
            } => {
                params.extend([
                    ("mode", "subscription".to_string()),
                    ("customer", customer_id.clone()),
                    ("line_items[0][price]", price_id.clone()),
                    (
                        "subscription_data[application_fee_percent]",
                        application_fee_percent.value().to_string(),
                    ),
                    (
                        "subscription_data[transfer_data][destination]",
                        request.destination_account.clone(),
                    ),
                    ("subscription_data[metadata][contract_id]", contract_id),
                ]);
            }
        }

        params
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut params = vec![("metadata[user_id]", request.user_id.to_string())];
        if let Some(email) = &request.email {
            params.push(("email", email.clone()));
        }

        let customer: StripeCustomer = self
            .post_form("/v1/customers", &params, Some(&request.idempotency_key))
            .await?;

        Ok(Customer {
            id: customer.id,
            email: customer.email.or(request.email),
        })
    }

    async fn create_metered_price(
        &self,
        request: CreateMeteredPriceRequest,
    ) -> Result<MeteredPrice, PaymentError> {
        let params = vec![
            ("currency", request.currency.clone()),
            ("unit_amount", request.unit_amount_minor.to_string()),
            ("product_data[name]", request.product_name.clone()),
            ("recurring[interval]", METERED_INTERVAL.to_string()),
            ("recurring[interval_count]", METERED_INTERVAL_COUNT.to_string()),
            ("recurring[usage_type]", "metered".to_string()),
            ("recurring[aggregate_usage]", "sum".to_string()),
            ("transform_quantity[divide_by]", VIEWS_PER_BILLING_UNIT.to_string()),
            ("transform_quantity[round]", "up".to_string()),
            (
                "metadata[contract_id]",
                request.contract_id.to_string(),
            ),
        ];

        let price: StripePrice = self
            .post_form("/v1/prices", &params, Some(&request.idempotency_key))
            .await?;

        Ok(MeteredPrice { id: price.id })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let params = Self::checkout_params(&request);

        let session: StripeCheckoutSession = self
            .post_form("/v1/checkout/sessions", &params, Some(&request.idempotency_key))
            .await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(format!("Checkout session {} has no URL", session.id))
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, PaymentError> {
        let session: StripeCheckoutSession = self
            .get_json(&format!("/v1/checkout/sessions/{}", session_id))
            .await?;

        if session.contract_id().is_none() {
            tracing::warn!(session_id, "Checkout session has no {} metadata", CONTRACT_ID_METADATA_KEY);
        }

        Ok(session.into_details())
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), PaymentError> {
        let _: StripeCheckoutSession = self
            .post_form(
                &format!("/v1/checkout/sessions/{}/expire", session_id),
                &[],
                None,
            )
            .await?;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        let subscription: StripeSubscription = self
            .get_json(&format!("/v1/subscriptions/{}", subscription_id))
            .await?;

        Ok(subscription.into_subscription())
    }

    async fn schedule_subscription_cancellation(
        &self,
        subscription_id: &str,
        cancel_at: Timestamp,
    ) -> Result<(), PaymentError> {
        let _: StripeSubscription = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[("cancel_at", cancel_at.as_unix_secs().to_string())],
                None,
            )
            .await?;
        Ok(())
    }

    async fn report_usage(&self, report: UsageReport) -> Result<(), PaymentError> {
        let subscription = self.retrieve_subscription(&report.subscription_id).await?;
        let item_id = subscription.item_id.ok_or_else(|| {
            PaymentError::provider(format!(
                "Subscription {} has no metered item",
                report.subscription_id
            ))
        })?;

        #[derive(Deserialize)]
        struct UsageRecord {
            #[allow(dead_code)]
            id: String,
        }

        let _: UsageRecord = self
            .post_form(
                &format!("/v1/subscription_items/{}/usage_records", item_id),
                &[
                    ("quantity", report.quantity.to_string()),
                    ("timestamp", report.timestamp.as_unix_secs().to_string()),
                    ("action", "increment".to_string()),
                ],
                Some(&report.idempotency_key),
            )
            .await?;
        Ok(())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            "Webhook signature verified"
        );

        Ok(event)
    }
}
