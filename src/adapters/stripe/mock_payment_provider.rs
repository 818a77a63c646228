//! Mock payment provider for testing.
//!
//! Provides a configurable in-process implementation of `PaymentProvider`
//! for unit and integration tests. Supports:
//! - Sessions and subscriptions whose gateway-side state tests can drive
//! - Idempotency-key replay, as the real gateway does
//! - Error injection
//! - Call tracking
//! - Webhook parsing of unsigned Stripe-shaped JSON bodies

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::contract::SubscriptionStatus;
use crate::domain::foundation::Timestamp;
use crate::ports::{
    CheckoutMode, CheckoutSession, CheckoutSessionDetails, CheckoutSessionStatus,
    CreateCheckoutRequest, CreateCustomerRequest, CreateMeteredPriceRequest, Customer,
    MeteredPrice, PaymentError, PaymentErrorCode, PaymentProvider, Subscription, UsageReport,
    WebhookEvent,
};

use super::webhook_types::StripeWebhookEvent;

/// Mock payment provider for testing.
///
/// Clones share state, so a test can keep a handle while the code under
/// test owns another.
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.set_method_error("create_checkout_session", PaymentError::network("down"));
/// let result = handler.handle(cmd).await;
/// assert_eq!(mock.call_count("create_checkout_session"), 1);
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Monotonic counter for generated ids.
    seq: u64,

    customers: HashMap<String, Customer>,

    /// Results already returned, keyed by idempotency key.
    customers_by_key: HashMap<String, Customer>,
    prices_by_key: HashMap<String, MeteredPrice>,
    sessions_by_key: HashMap<String, CheckoutSession>,

    price_requests: Vec<CreateMeteredPriceRequest>,
    checkout_requests: Vec<CreateCheckoutRequest>,

    sessions: HashMap<String, CheckoutSessionDetails>,

    subscriptions: HashMap<String, Subscription>,

    /// Accepted usage reports, one per idempotency key.
    usage_reports: Vec<UsageReport>,

    /// Scheduled cancellations by subscription id.
    cancellations: HashMap<String, Timestamp>,

    /// Error to return on the next call to any method (consumed).
    next_error: Option<PaymentError>,

    /// Errors for specific methods (persistent until cleared).
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,

    webhook_verify_mode: WebhookVerifyMode,
}

/// Record of a method call for verification.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// How webhook verification should behave.
#[derive(Debug, Clone, Default)]
pub enum WebhookVerifyMode {
    /// Accept any signature.
    #[default]
    AcceptAll,
    /// Require this exact signature.
    RequireSignature(String),
    /// Always fail verification.
    AlwaysFail,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that rejects every webhook signature.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.set_webhook_verify_mode(WebhookVerifyMode::AlwaysFail);
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration
    // ════════════════════════════════════════════════════════════════════════════

    pub fn set_webhook_verify_mode(&self, mode: WebhookVerifyMode) {
        self.inner.lock().unwrap().webhook_verify_mode = mode;
    }

    pub fn add_customer(&self, customer: Customer) {
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(customer.id.clone(), customer);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    /// Register an active metered subscription.
    pub fn add_active_subscription(&self, subscription_id: &str, customer_id: &str) {
        self.add_subscription(Subscription {
            id: subscription_id.to_string(),
            customer_id: customer_id.to_string(),
            status: SubscriptionStatus::Active,
            item_id: Some(format!("si_{}", subscription_id)),
            cancel_at: None,
        });
    }

    /// Change the gateway-side status of a subscription.
    pub fn set_subscription_status(&self, subscription_id: &str, status: SubscriptionStatus) {
        if let Some(sub) = self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .get_mut(subscription_id)
        {
            sub.status = status;
        }
    }

    /// Register a session directly, bypassing `create_checkout_session`.
    pub fn add_session(&self, details: CheckoutSessionDetails) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(details.id.clone(), details);
    }

    /// Mark a one-time session paid, as if the licensee completed checkout.
    pub fn complete_one_time_session(&self, session_id: &str) {
        let mut state = self.inner.lock().unwrap();
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.status = CheckoutSessionStatus::Complete;
            session.payment_status = Some("paid".to_string());
            session.url = None;
        }
    }

    /// Complete a subscription session, creating the subscription it produced.
    pub fn complete_subscription_session(&self, session_id: &str, subscription_id: &str) {
        let mut state = self.inner.lock().unwrap();
        let Some(session) = state.sessions.get_mut(session_id) else {
            return;
        };
        session.status = CheckoutSessionStatus::Complete;
        session.payment_status = Some("paid".to_string());
        session.subscription_id = Some(subscription_id.to_string());
        session.url = None;
        let customer_id = session.customer_id.clone().unwrap_or_default();

        state.subscriptions.insert(
            subscription_id.to_string(),
            Subscription {
                id: subscription_id.to_string(),
                customer_id,
                status: SubscriptionStatus::Active,
                item_id: Some(format!("si_{}", subscription_id)),
                cancel_at: None,
            },
        );
    }

    /// Expire a session on the gateway side.
    pub fn expire_session(&self, session_id: &str) {
        if let Some(session) = self.inner.lock().unwrap().sessions.get_mut(session_id) {
            session.status = CheckoutSessionStatus::Expired;
            session.url = None;
        }
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.inner.lock().unwrap().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.inner
            .lock()
            .unwrap()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.inner.lock().unwrap();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn session(&self, session_id: &str) -> Option<CheckoutSessionDetails> {
        self.inner.lock().unwrap().sessions.get(session_id).cloned()
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.inner.lock().unwrap().checkout_requests.clone()
    }

    pub fn price_requests(&self) -> Vec<CreateMeteredPriceRequest> {
        self.inner.lock().unwrap().price_requests.clone()
    }

    pub fn usage_reports(&self) -> Vec<UsageReport> {
        self.inner.lock().unwrap().usage_reports.clone()
    }

    pub fn scheduled_cancellation(&self, subscription_id: &str) -> Option<Timestamp> {
        self.inner
            .lock()
            .unwrap()
            .cancellations
            .get(subscription_id)
            .copied()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.inner.lock().unwrap().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.inner.lock().unwrap().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.inner.lock().unwrap();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.seq += 1;
        format!("{}_mock_{}", prefix, self.seq)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.record_call(
            "create_customer",
            vec![request.user_id.to_string(), request.idempotency_key.clone()],
        );
        self.check_error("create_customer")?;

        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.customers_by_key.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let customer = Customer {
            id: state.next_id("cus"),
            email: request.email,
        };
        state.customers.insert(customer.id.clone(), customer.clone());
        state
            .customers_by_key
            .insert(request.idempotency_key, customer.clone());

        Ok(customer)
    }

    async fn create_metered_price(
        &self,
        request: CreateMeteredPriceRequest,
    ) -> Result<MeteredPrice, PaymentError> {
        self.record_call(
            "create_metered_price",
            vec![
                request.contract_id.to_string(),
                request.unit_amount_minor.to_string(),
            ],
        );
        self.check_error("create_metered_price")?;

        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.prices_by_key.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let price = MeteredPrice {
            id: state.next_id("price"),
        };
        state
            .prices_by_key
            .insert(request.idempotency_key.clone(), price.clone());
        state.price_requests.push(request);

        Ok(price)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![
                request.contract_id.to_string(),
                request.idempotency_key.clone(),
            ],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.sessions_by_key.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let id = state.next_id("cs");
        let url = format!("https://checkout.stripe.test/c/pay/{}", id);
        let (amount_total, currency, customer_id) = match &request.mode {
            CheckoutMode::OneTime {
                amount_minor,
                currency,
                ..
            } => (Some(*amount_minor), Some(currency.clone()), None),
            CheckoutMode::Subscription { customer_id, .. } => {
                (None, None, Some(customer_id.clone()))
            }
        };

        let session = CheckoutSession {
            id: id.clone(),
            url: url.clone(),
            expires_at: Some(chrono::Utc::now().timestamp() + 24 * 60 * 60),
        };

        state.sessions.insert(
            id.clone(),
            CheckoutSessionDetails {
                id,
                status: CheckoutSessionStatus::Open,
                payment_status: Some("unpaid".to_string()),
                url: Some(url),
                subscription_id: None,
                customer_id,
                amount_total,
                currency,
                contract_id: Some(request.contract_id),
            },
        );
        state
            .sessions_by_key
            .insert(request.idempotency_key.clone(), session.clone());
        state.checkout_requests.push(request);

        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, PaymentError> {
        self.record_call("retrieve_checkout_session", vec![session_id.to_string()]);
        self.check_error("retrieve_checkout_session")?;

        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Checkout session"))
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<(), PaymentError> {
        self.record_call("expire_checkout_session", vec![session_id.to_string()]);
        self.check_error("expire_checkout_session")?;

        let mut state = self.inner.lock().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| PaymentError::not_found("Checkout session"))?;

        if session.status != CheckoutSessionStatus::Open {
            return Err(PaymentError::provider(format!(
                "Checkout session {} is not open",
                session_id
            )));
        }
        session.status = CheckoutSessionStatus::Expired;
        session.url = None;
        Ok(())
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentError> {
        self.record_call("retrieve_subscription", vec![subscription_id.to_string()]);
        self.check_error("retrieve_subscription")?;

        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Subscription"))
    }

    async fn schedule_subscription_cancellation(
        &self,
        subscription_id: &str,
        cancel_at: Timestamp,
    ) -> Result<(), PaymentError> {
        self.record_call(
            "schedule_subscription_cancellation",
            vec![subscription_id.to_string(), cancel_at.to_string()],
        );
        self.check_error("schedule_subscription_cancellation")?;

        let mut state = self.inner.lock().unwrap();
        if let Some(sub) = state.subscriptions.get_mut(subscription_id) {
            sub.cancel_at = Some(cancel_at.as_unix_secs());
        }
        state
            .cancellations
            .insert(subscription_id.to_string(), cancel_at);
        Ok(())
    }

    async fn report_usage(&self, report: UsageReport) -> Result<(), PaymentError> {
        self.record_call(
            "report_usage",
            vec![
                report.subscription_id.clone(),
                report.quantity.to_string(),
                report.idempotency_key.clone(),
            ],
        );
        self.check_error("report_usage")?;

        let mut state = self.inner.lock().unwrap();
        if !state.subscriptions.contains_key(&report.subscription_id) {
            return Err(PaymentError::not_found("Subscription"));
        }
        let earlier = state
            .usage_reports
            .iter()
            .find(|r| r.idempotency_key == report.idempotency_key);
        match earlier {
            Some(r) if r.quantity != report.quantity => Err(PaymentError::new(
                PaymentErrorCode::IdempotencyConflict,
                "Idempotency key reused with different parameters",
            )),
            Some(_) => Ok(()),
            None => {
                state.usage_reports.push(report);
                Ok(())
            }
        }
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.record_call(
            "verify_webhook",
            vec![
                String::from_utf8_lossy(payload).chars().take(50).collect(),
                signature.chars().take(20).collect(),
            ],
        );
        self.check_error("verify_webhook")?;

        match &self.inner.lock().unwrap().webhook_verify_mode {
            WebhookVerifyMode::AcceptAll => {}
            WebhookVerifyMode::RequireSignature(required) => {
                if signature != required {
                    return Err(PaymentError::invalid_webhook("Invalid signature"));
                }
            }
            WebhookVerifyMode::AlwaysFail => {
                return Err(PaymentError::invalid_webhook("Verification disabled"));
            }
        }

        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::invalid_webhook(format!("Invalid JSON: {}", e)))?;
        stripe_event.into_webhook_event()
    }
}
