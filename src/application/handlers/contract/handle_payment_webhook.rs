//! HandlePaymentWebhookHandler - Command handler for payment gateway webhooks.
//!
//! Verifies the signature, resolves the contract the event is about,
//! translates the event into a `GatewayFact` and applies it through the
//! same path the sweeper uses. The gateway delivers at least once, so
//! every branch is safe to run twice: a recorded event id short-circuits,
//! and revenue is unique on the gateway's own session or invoice id.

use std::sync::Arc;

use super::apply_gateway_fact::{FactApplication, GatewayFactApplier};
use crate::domain::contract::{Contract, ContractError, GatewayFact};
use crate::domain::foundation::ContractId;
use crate::ports::{
    ContractRepository, PaymentProvider, WebhookDisposition, WebhookEvent, WebhookEventData,
    WebhookEventRecord, WebhookEventRepository, WebhookEventType,
};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone)]
pub enum HandlePaymentWebhookResult {
    /// Contract changed or revenue was recorded.
    Applied(Contract),
    /// Contract already reflected the event.
    Unchanged(Contract),
    /// Event id was handled before.
    Duplicate,
    /// Unknown type, no matching contract, or nothing to apply.
    Ignored { reason: String },
}

impl HandlePaymentWebhookResult {
    pub fn disposition(&self) -> WebhookDisposition {
        match self {
            HandlePaymentWebhookResult::Applied(_) => WebhookDisposition::Applied,
            HandlePaymentWebhookResult::Ignored { .. } => WebhookDisposition::Ignored,
            HandlePaymentWebhookResult::Unchanged(_) | HandlePaymentWebhookResult::Duplicate => {
                WebhookDisposition::Unchanged
            }
        }
    }
}

/// What an event says, before it is matched to a contract.
enum Interpretation {
    Fact(GatewayFact),
    Ignore(String),
}

/// Handler for processing payment provider webhooks.
pub struct HandlePaymentWebhookHandler {
    contracts: Arc<dyn ContractRepository>,
    payment_provider: Arc<dyn PaymentProvider>,
    webhook_events: Arc<dyn WebhookEventRepository>,
    applier: GatewayFactApplier,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        payment_provider: Arc<dyn PaymentProvider>,
        webhook_events: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        let applier = GatewayFactApplier::new(contracts.clone());
        Self {
            contracts,
            payment_provider,
            webhook_events,
            applier,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, ContractError> {
        // 1. Verify webhook signature and parse event
        let event = self
            .payment_provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook verification failed");
                ContractError::SignatureInvalid
            })?;

        // 2. Redelivery of a handled event
        if self
            .webhook_events
            .find_by_event_id(&event.id)
            .await?
            .is_some()
        {
            tracing::debug!(event_id = %event.id, "Webhook already handled");
            return Ok(HandlePaymentWebhookResult::Duplicate);
        }

        // 3. Resolve, translate, apply
        let (result, contract_id) = self.process(&event).await?;

        // 4. Record only after success so failed deliveries are retried
        let disposition = result.disposition();
        let mut record =
            WebhookEventRecord::new(&event.id, event.event_type.as_str(), disposition);
        if let Some(id) = contract_id {
            record = record.with_contract(id.to_string());
        }
        if let HandlePaymentWebhookResult::Ignored { reason } = &result {
            record = record.with_note(reason.clone());
        }
        self.webhook_events.save(record).await?;

        tracing::info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            disposition = %disposition,
            "Webhook handled"
        );
        Ok(result)
    }

    async fn process(
        &self,
        event: &WebhookEvent,
    ) -> Result<(HandlePaymentWebhookResult, Option<ContractId>), ContractError> {
        if let WebhookEventType::Unknown(kind) = &event.event_type {
            return Ok((ignored(format!("unhandled event type {}", kind)), None));
        }

        let Some(contract) = self.resolve_contract(&event.data).await? else {
            tracing::warn!(
                event_id = %event.id,
                event_type = event.event_type.as_str(),
                "Webhook matches no contract"
            );
            return Ok((ignored("no matching contract"), None));
        };

        let fact = match interpret(event, &contract) {
            Interpretation::Fact(fact) => fact,
            Interpretation::Ignore(reason) => {
                tracing::debug!(event_id = %event.id, contract_id = %contract.id, %reason, "Webhook ignored");
                return Ok((ignored(reason), Some(contract.id)));
            }
        };

        let result = match self.applier.apply(contract.id, &fact).await? {
            FactApplication::Applied(c) => HandlePaymentWebhookResult::Applied(c),
            FactApplication::Unchanged(c) => HandlePaymentWebhookResult::Unchanged(c),
        };
        Ok((result, Some(contract.id)))
    }

    /// Checkout events correlate by metadata, then session id. Invoice and
    /// subscription events correlate by subscription id, then metadata.
    async fn resolve_contract(
        &self,
        data: &WebhookEventData,
    ) -> Result<Option<Contract>, ContractError> {
        match data {
            WebhookEventData::Checkout { session_id, .. } => {
                if let Some(found) = self.by_metadata(data).await? {
                    return Ok(Some(found));
                }
                Ok(self.contracts.find_by_session_id(session_id).await?)
            }
            WebhookEventData::Subscription {
                subscription_id, ..
            } => self.by_subscription_then_metadata(Some(subscription_id), data).await,
            WebhookEventData::Invoice {
                subscription_id, ..
            } => {
                self.by_subscription_then_metadata(subscription_id.as_ref(), data)
                    .await
            }
            WebhookEventData::Raw { .. } => Ok(None),
        }
    }

    async fn by_subscription_then_metadata(
        &self,
        subscription_id: Option<&String>,
        data: &WebhookEventData,
    ) -> Result<Option<Contract>, ContractError> {
        if let Some(subscription_id) = subscription_id {
            if let Some(found) = self.contracts.find_by_subscription_id(subscription_id).await? {
                return Ok(Some(found));
            }
        }
        self.by_metadata(data).await
    }

    async fn by_metadata(&self, data: &WebhookEventData) -> Result<Option<Contract>, ContractError> {
        match data.contract_id() {
            Some(id) => Ok(self.contracts.find_by_id(&id).await?),
            None => Ok(None),
        }
    }
}

fn ignored(reason: impl Into<String>) -> HandlePaymentWebhookResult {
    HandlePaymentWebhookResult::Ignored {
        reason: reason.into(),
    }
}

fn interpret(event: &WebhookEvent, contract: &Contract) -> Interpretation {
    match (&event.event_type, &event.data) {
        (
            WebhookEventType::CheckoutSessionCompleted,
            WebhookEventData::Checkout {
                session_id,
                mode,
                payment_status,
                customer_id,
                subscription_id,
                amount_total,
                currency,
                ..
            },
        ) => match (mode.as_str(), subscription_id) {
            ("subscription", Some(subscription_id)) => {
                Interpretation::Fact(GatewayFact::CheckoutCompletedRecurring {
                    session_id: session_id.clone(),
                    subscription_id: subscription_id.clone(),
                    customer_id: customer_id.clone(),
                })
            }
            ("subscription", None) => {
                Interpretation::Ignore("subscription checkout without subscription".to_string())
            }
            _ if matches!(
                payment_status.as_deref(),
                Some("paid") | Some("no_payment_required")
            ) =>
            {
                Interpretation::Fact(GatewayFact::CheckoutCompletedOneTime {
                    session_id: session_id.clone(),
                    amount_minor: amount_total
                        .unwrap_or_else(|| contract.price_value.to_minor_units()),
                    currency: currency.clone().unwrap_or_else(|| contract.currency.clone()),
                })
            }
            _ => Interpretation::Ignore("checkout completed without settled payment".to_string()),
        },

        (WebhookEventType::CheckoutSessionExpired, WebhookEventData::Checkout { .. }) => {
            Interpretation::Fact(GatewayFact::SessionExpired)
        }

        (
            WebhookEventType::InvoicePaid,
            WebhookEventData::Invoice {
                invoice_id,
                customer_id,
                subscription_id: Some(subscription_id),
                amount_paid,
                currency,
                ..
            },
        ) => Interpretation::Fact(GatewayFact::InvoicePaid {
            invoice_id: invoice_id.clone(),
            amount_minor: *amount_paid,
            currency: currency.clone(),
            subscription_id: subscription_id.clone(),
            customer_id: customer_id.clone(),
        }),

        (WebhookEventType::InvoicePaymentFailed, WebhookEventData::Invoice { invoice_id, .. }) => {
            Interpretation::Fact(GatewayFact::InvoicePaymentFailed {
                invoice_id: invoice_id.clone(),
            })
        }

        (WebhookEventType::SubscriptionDeleted, WebhookEventData::Subscription { .. }) => {
            Interpretation::Fact(GatewayFact::SubscriptionDeleted)
        }

        (WebhookEventType::SubscriptionUpdated, WebhookEventData::Subscription { status, .. }) => {
            Interpretation::Fact(GatewayFact::SubscriptionStatusObserved(*status))
        }

        (event_type, _) => Interpretation::Ignore(format!(
            "{} carried no usable payload",
            event_type.as_str()
        )),
    }
}
